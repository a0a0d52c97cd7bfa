pub mod planbench;
pub mod reducebench;
