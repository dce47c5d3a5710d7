use std::sync::Arc;
use std::time::Duration;

use roster_core::domain::customer::{CustomerId, NewCustomer, UpdateCustomer};
use roster_core::errors::{ServiceError, StorageErrorKind, ValidationError};
use roster_core::service::CustomerService;
use roster_db::repositories::{InMemoryCustomerRepository, SqlCustomerRepository};
use roster_db::{connect, schema, Store};

type ContractResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
    ($left:expr, $right:expr, $($arg:tt)*) => {
        if $left != $right {
            return Err(format!($($arg)*));
        }
    };
}

async fn sql_service() -> ContractResult<CustomerService> {
    let pool = connect("sqlite::memory:").await.map_err(|e| format!("connect: {e}"))?;
    let store = Store::from_pool(pool);
    schema::initialize(&store).await.map_err(|e| format!("schema: {e}"))?;
    Ok(CustomerService::new(Arc::new(SqlCustomerRepository::new(store))))
}

fn memory_service() -> CustomerService {
    CustomerService::new(Arc::new(InMemoryCustomerRepository::default()))
}

async fn services() -> ContractResult<Vec<(&'static str, CustomerService)>> {
    Ok(vec![("sql", sql_service().await?), ("memory", memory_service())])
}

fn new_customer(id: Option<&str>, name: &str, email: &str) -> NewCustomer {
    NewCustomer {
        id: id.map(str::to_string),
        name: Some(name.to_string()),
        email: Some(email.to_string()),
    }
}

fn replacement(name: &str, email: &str) -> UpdateCustomer {
    UpdateCustomer { id: None, name: Some(name.to_string()), email: Some(email.to_string()) }
}

#[tokio::test]
async fn create_then_find_returns_matching_record() -> ContractResult {
    for (label, service) in services().await? {
        for (name, email) in [("Ada", "ada@x.com"), ("Grace Hopper", "grace@navy.mil")] {
            let created = service
                .create(new_customer(None, name, email))
                .await
                .map_err(|e| format!("{label}: create failed: {e}"))?;
            let found = service
                .find_by_id(&created.id)
                .await
                .map_err(|e| format!("{label}: find failed: {e}"))?
                .ok_or_else(|| format!("{label}: created customer should be found"))?;

            require_eq!(found.name, name);
            require_eq!(found.email, email);
            require_eq!(found.created_at, found.updated_at, "{label}: timestamps should match");
            require_eq!(found, created, "{label}: stored record should equal returned record");
        }
    }
    Ok(())
}

#[tokio::test]
async fn create_example_generates_uuid_and_lists_exactly_that_record() -> ContractResult {
    for (label, service) in services().await? {
        let created = service
            .create(new_customer(None, "Ada", "ada@x.com"))
            .await
            .map_err(|e| format!("{label}: create failed: {e}"))?;

        require_eq!(created.id.as_str().len(), 36, "{label}: id should be a hyphenated uuid");
        require_eq!(created.name, "Ada");
        require_eq!(created.email, "ada@x.com");

        let all = service.find_all().await.map_err(|e| format!("{label}: list failed: {e}"))?;
        require_eq!(all, vec![created], "{label}: list should contain exactly the new record");
    }
    Ok(())
}

#[tokio::test]
async fn create_with_empty_fields_writes_nothing() -> ContractResult {
    for (label, service) in services().await? {
        for input in [
            new_customer(None, "", "ada@x.com"),
            new_customer(None, "Ada", ""),
            NewCustomer { id: Some("C-1".to_string()), name: None, email: None },
        ] {
            match service.create(input).await {
                Err(ServiceError::Validation(ValidationError::MissingField { .. })) => {}
                other => return Err(format!("{label}: expected validation error, got {other:?}")),
            }
        }

        let all = service.find_all().await.map_err(|e| format!("{label}: list failed: {e}"))?;
        require!(all.is_empty(), "{label}: rejected creates must not reach storage");
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_creates_with_same_email_admit_exactly_one() -> ContractResult {
    for (label, service) in services().await? {
        let first = {
            let service = service.clone();
            tokio::spawn(async move {
                service.create(new_customer(Some("C-1"), "Ada", "same@x.com")).await
            })
        };
        let second = {
            let service = service.clone();
            tokio::spawn(async move {
                service.create(new_customer(Some("C-2"), "Ada Two", "same@x.com")).await
            })
        };

        let results = [
            first.await.map_err(|e| format!("{label}: join failed: {e}"))?,
            second.await.map_err(|e| format!("{label}: join failed: {e}"))?,
        ];
        let successes = results.iter().filter(|result| result.is_ok()).count();
        let constraint_failures = results
            .iter()
            .filter(|result| {
                matches!(
                    result,
                    Err(ServiceError::Storage(error)) if error.kind() == StorageErrorKind::Constraint
                )
            })
            .count();

        require_eq!(successes, 1, "{label}: exactly one create should win");
        require_eq!(constraint_failures, 1, "{label}: the loser should hit the constraint");

        let all = service.find_all().await.map_err(|e| format!("{label}: list failed: {e}"))?;
        require_eq!(all.len(), 1);
    }
    Ok(())
}

#[tokio::test]
async fn duplicate_caller_supplied_id_is_a_storage_error() -> ContractResult {
    for (label, service) in services().await? {
        service
            .create(new_customer(Some("C-1"), "Ada", "ada@x.com"))
            .await
            .map_err(|e| format!("{label}: create failed: {e}"))?;

        let duplicate = service.create(new_customer(Some("C-1"), "Other", "other@x.com")).await;
        require!(
            matches!(
                duplicate,
                Err(ServiceError::Storage(ref error)) if error.kind() == StorageErrorKind::Constraint
            ),
            "{label}: duplicate id should be rejected by storage, got {duplicate:?}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn update_bumps_updated_at_and_preserves_identity() -> ContractResult {
    for (label, service) in services().await? {
        let created = service
            .create(new_customer(None, "Ada", "ada@x.com"))
            .await
            .map_err(|e| format!("{label}: create failed: {e}"))?;

        tokio::time::sleep(Duration::from_millis(5)).await;

        let updated = service
            .update(&created.id, replacement("Ada Lovelace", "ada@lovelace.org"))
            .await
            .map_err(|e| format!("{label}: update failed: {e}"))?
            .ok_or_else(|| format!("{label}: update should return the record"))?;

        require_eq!(updated.id, created.id);
        require_eq!(updated.created_at, created.created_at, "{label}: created_at must not move");
        require!(updated.updated_at > created.updated_at, "{label}: updated_at must advance");

        let found = service
            .find_by_id(&created.id)
            .await
            .map_err(|e| format!("{label}: find failed: {e}"))?
            .ok_or_else(|| format!("{label}: updated customer should be found"))?;
        require_eq!(found.name, "Ada Lovelace");
        require_eq!(found.email, "ada@lovelace.org");
        require_eq!(found, updated);
    }
    Ok(())
}

#[tokio::test]
async fn update_of_missing_id_returns_none_and_creates_nothing() -> ContractResult {
    for (label, service) in services().await? {
        let result = service
            .update(&CustomerId::from("missing"), replacement("Ada", "ada@x.com"))
            .await
            .map_err(|e| format!("{label}: update failed: {e}"))?;

        require_eq!(result, None, "{label}: missing id should not be an error");
        let all = service.find_all().await.map_err(|e| format!("{label}: list failed: {e}"))?;
        require!(all.is_empty(), "{label}: update must not upsert");
    }
    Ok(())
}

#[tokio::test]
async fn update_of_missing_id_with_taken_email_returns_none() -> ContractResult {
    for (label, service) in services().await? {
        service
            .create(new_customer(Some("C-1"), "Ada", "ada@x.com"))
            .await
            .map_err(|e| format!("{label}: create failed: {e}"))?;

        let result = service
            .update(&CustomerId::from("missing"), replacement("Someone", "ada@x.com"))
            .await
            .map_err(|e| format!("{label}: missing id should not be an error: {e}"))?;

        require_eq!(result, None, "{label}: missing id should report not found");
        let all = service.find_all().await.map_err(|e| format!("{label}: list failed: {e}"))?;
        require_eq!(all.len(), 1, "{label}: update must not upsert");
    }
    Ok(())
}

#[tokio::test]
async fn update_into_taken_email_is_a_storage_error() -> ContractResult {
    for (label, service) in services().await? {
        service
            .create(new_customer(Some("C-1"), "Ada", "ada@x.com"))
            .await
            .map_err(|e| format!("{label}: create failed: {e}"))?;
        service
            .create(new_customer(Some("C-2"), "Grace", "grace@x.com"))
            .await
            .map_err(|e| format!("{label}: create failed: {e}"))?;

        let result = service.update(&CustomerId::from("C-2"), replacement("Grace", "ada@x.com")).await;
        require!(
            matches!(
                result,
                Err(ServiceError::Storage(ref error)) if error.kind() == StorageErrorKind::Constraint
            ),
            "{label}: email collision should be a constraint error, got {result:?}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn delete_removes_once_then_reports_zero() -> ContractResult {
    for (label, service) in services().await? {
        let created = service
            .create(new_customer(None, "Ada", "ada@x.com"))
            .await
            .map_err(|e| format!("{label}: create failed: {e}"))?;

        let removed = service.delete(&created.id).await.map_err(|e| format!("{label}: {e}"))?;
        require_eq!(removed, 1);

        let found = service.find_by_id(&created.id).await.map_err(|e| format!("{label}: {e}"))?;
        require_eq!(found, None, "{label}: deleted customer should be gone");

        let removed_again =
            service.delete(&created.id).await.map_err(|e| format!("{label}: {e}"))?;
        require_eq!(removed_again, 0);
    }
    Ok(())
}

#[tokio::test]
async fn list_order_is_stable_across_reads() -> ContractResult {
    for (label, service) in services().await? {
        for (index, email) in ["c@x.com", "a@x.com", "b@x.com"].into_iter().enumerate() {
            service
                .create(new_customer(Some(&format!("C-{index}")), "Name", email))
                .await
                .map_err(|e| format!("{label}: create failed: {e}"))?;
        }

        let first = service.find_all().await.map_err(|e| format!("{label}: {e}"))?;
        let second = service.find_all().await.map_err(|e| format!("{label}: {e}"))?;
        let ids: Vec<&str> = first.iter().map(|customer| customer.id.as_str()).collect();

        require_eq!(ids, vec!["C-0", "C-1", "C-2"], "{label}: insertion order expected");
        require_eq!(first, second);
    }
    Ok(())
}
