pub mod card;
pub mod donations;
pub mod payments;
pub mod root;
