pub mod doctor;
pub mod linkage;

pub use doctor::DoctorService;
pub use linkage::LinkageService;
