pub mod email;
pub mod locks;

pub use email::EmailService;
pub use locks::LeadLocks;
