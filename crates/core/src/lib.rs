pub mod config;
pub mod domain;
pub mod errors;
pub mod repository;
pub mod service;

pub use domain::customer::{Customer, CustomerId, CustomerPatch, NewCustomer, UpdateCustomer};
pub use errors::{
    InterfaceError, ServiceError, StorageError, StorageErrorKind, ValidationError,
};
pub use repository::CustomerRepository;
pub use service::CustomerService;
