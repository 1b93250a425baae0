//! Person CRUD service.
//!
//! [`PersonService`] sits between the HTTP layer / importer and a
//! [`PersonRepository`]. It runs the domain checks a stored person must pass
//! and keeps a read-through cache for the list and detail queries:
//!
//! | Key                 | Holds                 | Dropped on            |
//! |---------------------|-----------------------|-----------------------|
//! | `pessoas:all`       | every person          | any write             |
//! | `pessoas:<uuid>`    | one person            | update/delete of it   |
//!
//! It also implements the importer's collaborators ([`PersonDirectory`],
//! [`PersonCreator`]).

pub mod repository;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::api::logs::log_warning;
use crate::cache::JsonCache;
use crate::error::{StoreError, StoreResult};
use crate::import::PersonCreator;
use crate::models::{Person, PersonCreationRequest};
use crate::validation::{is_valid_cpf, normalize_cpf, PersonDirectory};

pub use repository::{MemoryPersonRepository, PersonRepository};

const ALL_KEY: &str = "pessoas:all";

fn person_key(id: Uuid) -> String {
    format!("pessoas:{}", id)
}

/// Paging and filtering for [`PersonService::list`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    /// 1-based page number
    pub page: usize,
    pub page_size: usize,
    /// Case-insensitive name fragment, or CPF digits
    pub search: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            search: None,
        }
    }
}

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: usize = 200;

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

/// Person CRUD with caching.
#[derive(Clone)]
pub struct PersonService {
    repository: Arc<dyn PersonRepository>,
    cache: JsonCache,
}

impl PersonService {
    pub fn new(repository: Arc<dyn PersonRepository>, cache: JsonCache) -> Self {
        Self { repository, cache }
    }

    /// Service over in-memory storage and cache.
    pub fn in_memory(cache_ttl: Duration) -> Self {
        Self::new(
            Arc::new(MemoryPersonRepository::new()),
            JsonCache::in_memory(cache_ttl),
        )
    }

    pub async fn create(&self, request: PersonCreationRequest) -> StoreResult<Person> {
        let request = check_request(request)?;
        if self.repository.exists_by_cpf(&request.national_id).await? {
            return Err(StoreError::DuplicateNationalId(request.national_id));
        }

        let person = self.repository.insert(Person::new(request)).await?;
        self.forget(&[ALL_KEY]).await;
        Ok(person)
    }

    pub async fn get(&self, id: Uuid) -> StoreResult<Person> {
        let repository = &self.repository;
        self.cache
            .get_or_load(&person_key(id), || async move {
                repository
                    .get(id)
                    .await?
                    .ok_or_else(|| StoreError::NotFound(id.to_string()))
            })
            .await
    }

    /// Every stored person, cached as a whole.
    pub async fn all(&self) -> StoreResult<Vec<Person>> {
        let repository = &self.repository;
        self.cache
            .get_or_load(ALL_KEY, || async move { repository.list().await })
            .await
    }

    pub async fn list(&self, query: &ListQuery) -> StoreResult<Page<Person>> {
        let page = query.page.max(1);
        let page_size = query.page_size.clamp(1, MAX_PAGE_SIZE);

        let matching: Vec<Person> = match query.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => self
                .all()
                .await?
                .into_iter()
                .filter(|p| matches_search(p, term))
                .collect(),
            _ => self.all().await?,
        };

        let total = matching.len();
        let items = matching
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }

    pub async fn update(&self, id: Uuid, request: PersonCreationRequest) -> StoreResult<Person> {
        let request = check_request(request)?;
        let mut person = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        person.apply(request);
        let person = self.repository.update(person).await?;
        self.forget(&[ALL_KEY, &person_key(id)]).await;
        Ok(person)
    }

    pub async fn delete(&self, id: Uuid) -> StoreResult<()> {
        if !self.repository.delete(id).await? {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.forget(&[ALL_KEY, &person_key(id)]).await;
        Ok(())
    }

    async fn forget(&self, keys: &[&str]) {
        for key in keys {
            if let Err(e) = self.cache.remove(key).await {
                log_warning(format!("Cache invalidation failed for {}: {}", key, e));
            }
        }
    }
}

/// Domain checks shared by create and update. Normalizes the CPF to digits.
fn check_request(mut request: PersonCreationRequest) -> StoreResult<PersonCreationRequest> {
    request.name = request.name.trim().to_string();
    if request.name.is_empty() {
        return Err(StoreError::invalid("name", "is required"));
    }

    if !is_valid_cpf(&request.national_id) {
        return Err(StoreError::invalid(
            "nationalId",
            format!("'{}' is not a valid CPF", request.national_id),
        ));
    }
    if let Some(digits) = normalize_cpf(&request.national_id) {
        request.national_id = digits;
    }

    request.email = request
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());
    if let Some(email) = &request.email {
        if !email.contains('@') {
            return Err(StoreError::invalid("email", "must contain '@'"));
        }
    }

    request.address = request.address.filter(|a| !a.is_empty());
    Ok(request)
}

fn matches_search(person: &Person, term: &str) -> bool {
    let digits: String = term.chars().filter(char::is_ascii_digit).collect();
    if !digits.is_empty() && person.national_id.contains(&digits) {
        return true;
    }
    person.name.to_lowercase().contains(&term.to_lowercase())
}

#[async_trait]
impl PersonDirectory for PersonService {
    async fn exists_by_national_id(&self, national_id: &str) -> StoreResult<bool> {
        self.repository.exists_by_cpf(national_id).await
    }
}

#[async_trait]
impl PersonCreator for PersonService {
    async fn create_person(&self, request: PersonCreationRequest) -> StoreResult<()> {
        self.create(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{import_bytes, ImportOptions};
    use chrono::NaiveDate;

    fn service() -> PersonService {
        PersonService::in_memory(Duration::from_secs(60))
    }

    fn request(name: &str, cpf: &str) -> PersonCreationRequest {
        PersonCreationRequest {
            name: name.into(),
            email: Some("x@y.com".into()),
            national_id: cpf.into(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            phone: None,
            place_of_birth: None,
            nationality: None,
            sex: None,
            address: None,
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_cpf() {
        let people = service();
        let person = people.create(request(" Ana ", "111.444.777-35")).await.unwrap();

        assert_eq!(person.name, "Ana");
        assert_eq!(person.national_id, "11144477735");
        assert!(people.exists_by_national_id("11144477735").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid() {
        let people = service();

        let err = people.create(request("", "11144477735")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid { ref field, .. } if field == "name"));

        let err = people.create(request("Ana", "123")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid { ref field, .. } if field == "nationalId"));

        let mut bad_email = request("Ana", "11144477735");
        bad_email.email = Some("nope".into());
        assert!(people.create(bad_email).await.is_err());
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate() {
        let people = service();
        people.create(request("Ana", "11144477735")).await.unwrap();

        let err = people.create(request("Bia", "111.444.777-35")).await.unwrap_err();
        assert_eq!(err, StoreError::DuplicateNationalId("11144477735".into()));
    }

    #[tokio::test]
    async fn test_list_sees_new_person_after_cached_read() {
        let people = service();
        people.create(request("Ana", "11144477735")).await.unwrap();
        assert_eq!(people.all().await.unwrap().len(), 1);

        people.create(request("Caio", "52998224725")).await.unwrap();
        assert_eq!(people.all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_detail_refreshed_after_update() {
        let people = service();
        let ana = people.create(request("Ana", "11144477735")).await.unwrap();
        assert_eq!(people.get(ana.id).await.unwrap().name, "Ana");

        people.update(ana.id, request("Ana Maria", "11144477735")).await.unwrap();
        assert_eq!(people.get(ana.id).await.unwrap().name, "Ana Maria");
    }

    #[tokio::test]
    async fn test_update_cannot_take_other_cpf() {
        let people = service();
        let ana = people.create(request("Ana", "11144477735")).await.unwrap();
        people.create(request("Caio", "52998224725")).await.unwrap();

        let err = people.update(ana.id, request("Ana", "52998224725")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateNationalId(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let people = service();
        let ana = people.create(request("Ana", "11144477735")).await.unwrap();
        people.get(ana.id).await.unwrap();

        people.delete(ana.id).await.unwrap();
        assert!(matches!(people.get(ana.id).await, Err(StoreError::NotFound(_))));
        assert!(matches!(people.delete(ana.id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_paging_and_search() {
        let people = service();
        people.create(request("Ana", "11144477735")).await.unwrap();
        people.create(request("Caio", "52998224725")).await.unwrap();

        let page = people
            .list(&ListQuery {
                page: 2,
                page_size: 1,
                search: None,
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].name, "Caio");

        let found = people
            .list(&ListQuery {
                search: Some("529.982".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.items[0].name, "Caio");

        let found = people
            .list(&ListQuery {
                search: Some("an".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.items[0].name, "Ana");
    }

    #[tokio::test]
    async fn test_list_far_page_is_empty() {
        let people = service();
        people.create(request("Ana", "11144477735")).await.unwrap();

        let page = people
            .list(&ListQuery {
                page: usize::MAX,
                page_size: MAX_PAGE_SIZE,
                search: None,
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert!(page.items.is_empty());
        assert_eq!(page.page, usize::MAX);
    }

    #[tokio::test]
    async fn test_import_against_stored_people() {
        let people = service();
        people.create(request("Ana", "11144477735")).await.unwrap();

        let result = import_bytes(
            b"Nome,CPF,DataNascimento\nAna,11144477735,1990-01-01\nCaio,52998224725,1992-03-03",
            Some("people.csv"),
            ImportOptions::default(),
            &people,
        )
        .await;

        assert_eq!(result.success, 1);
        assert_eq!(result.errors, 1);
        assert!(result.details[0].message.contains("already registered"));
        assert_eq!(people.all().await.unwrap().len(), 2);
    }
}
