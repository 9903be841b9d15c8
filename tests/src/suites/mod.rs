pub mod descriptors;
pub mod exceptions;
pub mod heap;
pub mod irq;
pub mod keyboard;
pub mod paging;
pub mod timer;
