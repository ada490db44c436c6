//! External collaborators: device location, places search, transit routing,
//! weather and reminder delivery. Each sits behind a trait so the dispatcher
//! can run against doubles.

pub mod location;
pub mod places;
pub mod reminder;
pub mod transit;
pub mod weather;
