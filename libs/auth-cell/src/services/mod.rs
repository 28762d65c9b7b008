pub mod identity;
pub mod role;

pub use identity::IdentityService;
pub use role::RoleService;
