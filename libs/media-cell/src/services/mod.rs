pub mod avatar;

pub use avatar::AvatarService;
