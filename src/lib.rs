pub mod auth;
pub mod calls;
pub mod campaigns;
pub mod crm;
pub mod directory;
pub mod reports;
pub mod security;
pub mod shared;
pub mod tickets;
pub mod webhooks;
