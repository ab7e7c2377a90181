//! EXIF handling: the binary orientation scanner and the metadata copy pass
//! used when writing cropped JPEG output.

pub mod copy;
pub mod orientation;

pub use copy::copy_exif;
pub use orientation::{read_orientation, ExifInfo, UNKNOWN_ORIENTATION};
