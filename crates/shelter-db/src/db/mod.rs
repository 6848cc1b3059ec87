//! Database repositories for data access layer
//!
//! Each repository owns one table. The profile-picture coordinator is the only
//! writer of `animal_images.is_profile_picture` and `animals.image_url`.

// Animal rows and their protocol document
pub mod animal;
//
// Images attached to animals
pub mod animal_image;
//
// Profile picture promotion and guarded image deletion
pub mod profile_picture;
//
// Transaction utilities
pub mod transaction;

pub use animal::AnimalRepository;
pub use animal_image::AnimalImageRepository;
pub use profile_picture::ProfilePictureCoordinator;
pub use transaction::TransactionGuard;
