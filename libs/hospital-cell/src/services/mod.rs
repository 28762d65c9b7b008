pub mod hospital;
pub mod staff;
pub mod template;

pub use hospital::HospitalService;
pub use staff::StaffService;
pub use template::TemplateService;
