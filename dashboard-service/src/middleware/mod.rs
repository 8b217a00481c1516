pub mod guard;
pub mod session;

pub use guard::{route_guard, GuardDecision, RouteClass, RouteTable};
pub use session::{ResolvedSession, SessionOutcome, SessionResolver};
