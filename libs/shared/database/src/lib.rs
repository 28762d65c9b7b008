pub mod cloudinary;
pub mod supabase;
