pub mod access;
pub mod prescriptions;
pub mod records;

pub use access::AccessService;
pub use prescriptions::PrescriptionService;
pub use records::RecordService;
