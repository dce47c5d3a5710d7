//! Customer resource routes.
//!
//! - `POST   /api/customer`       create, 201
//! - `GET    /api/customer`       list, 200
//! - `GET    /api/customer/{id}`  fetch one (`data` is `null` when absent), 200
//! - `PUT    /api/customer/{id}`  full replacement of `name` and `email`, 200
//! - `DELETE /api/customer/{id}`  rows removed, 200

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use roster_core::{
    Customer, CustomerId, CustomerService, InterfaceError, NewCustomer, ServiceError,
    UpdateCustomer,
};
use tracing::{error, warn};

use crate::auth::{require_principal, Authenticator};
use crate::envelope::{success, ApiEnvelope, ApiError};
use crate::middleware::CorrelationId;

#[derive(Clone)]
pub struct CustomerState {
    service: CustomerService,
}

impl CustomerState {
    pub fn new(service: CustomerService) -> Self {
        Self { service }
    }
}

type HandlerResult<T> = Result<(StatusCode, Json<ApiEnvelope<T>>), ApiError>;

pub fn router(service: CustomerService, authenticator: Authenticator) -> Router {
    Router::new()
        .route("/api/customer", get(list_customers).post(create_customer))
        .route(
            "/api/customer/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route_layer(middleware::from_fn_with_state(authenticator, require_principal))
        .with_state(CustomerState::new(service))
}

pub async fn create_customer(
    State(state): State<CustomerState>,
    correlation_id: CorrelationId,
    payload: Result<Json<NewCustomer>, JsonRejection>,
) -> HandlerResult<Customer> {
    let Json(input) = payload.map_err(|rejection| rejected_body(rejection, &correlation_id))?;
    let customer = state
        .service
        .create(input)
        .await
        .map_err(|error| request_failed("create", error, &correlation_id))?;
    Ok(success(StatusCode::CREATED, customer))
}

pub async fn list_customers(
    State(state): State<CustomerState>,
    correlation_id: CorrelationId,
) -> HandlerResult<Vec<Customer>> {
    let customers = state
        .service
        .find_all()
        .await
        .map_err(|error| request_failed("list", error, &correlation_id))?;
    Ok(success(StatusCode::OK, customers))
}

pub async fn get_customer(
    Path(id): Path<String>,
    State(state): State<CustomerState>,
    correlation_id: CorrelationId,
) -> HandlerResult<Option<Customer>> {
    let customer = state
        .service
        .find_by_id(&CustomerId(id))
        .await
        .map_err(|error| request_failed("get", error, &correlation_id))?;
    Ok(success(StatusCode::OK, customer))
}

pub async fn update_customer(
    Path(id): Path<String>,
    State(state): State<CustomerState>,
    correlation_id: CorrelationId,
    payload: Result<Json<UpdateCustomer>, JsonRejection>,
) -> HandlerResult<Option<Customer>> {
    let Json(input) = payload.map_err(|rejection| rejected_body(rejection, &correlation_id))?;
    let customer = state
        .service
        .update(&CustomerId(id), input)
        .await
        .map_err(|error| request_failed("update", error, &correlation_id))?;
    Ok(success(StatusCode::OK, customer))
}

pub async fn delete_customer(
    Path(id): Path<String>,
    State(state): State<CustomerState>,
    correlation_id: CorrelationId,
) -> HandlerResult<u64> {
    let removed = state
        .service
        .delete(&CustomerId(id))
        .await
        .map_err(|error| request_failed("delete", error, &correlation_id))?;
    Ok(success(StatusCode::OK, removed))
}

fn rejected_body(rejection: JsonRejection, correlation_id: &CorrelationId) -> ApiError {
    warn!(
        event_name = "customer.request.rejected",
        correlation_id = %correlation_id.as_str(),
        error = %rejection,
        "request body could not be decoded"
    );
    ApiError(InterfaceError::BadRequest {
        message: rejection.body_text(),
        correlation_id: correlation_id.as_str().to_string(),
    })
}

fn request_failed(
    operation: &'static str,
    error: ServiceError,
    correlation_id: &CorrelationId,
) -> ApiError {
    let diagnostic = error.to_string();
    let api_error = ApiError(error.into_interface(correlation_id.as_str()));
    let status = api_error.status();

    if status.is_server_error() {
        error!(
            event_name = "customer.request.failed",
            correlation_id = %correlation_id.as_str(),
            operation,
            status = status.as_u16(),
            error = %diagnostic,
            "customer request failed"
        );
    } else {
        warn!(
            event_name = "customer.request.failed",
            correlation_id = %correlation_id.as_str(),
            operation,
            status = status.as_u16(),
            error = %diagnostic,
            "customer request rejected"
        );
    }
    api_error
}
