pub mod cart;
pub mod customer;
pub mod order;
pub mod product;
