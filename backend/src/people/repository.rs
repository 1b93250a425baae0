//! Person storage.

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::Person;

/// Persistence for persons. CPF is unique across the store.
#[async_trait]
pub trait PersonRepository: Send + Sync {
    async fn insert(&self, person: Person) -> StoreResult<Person>;
    async fn get(&self, id: Uuid) -> StoreResult<Option<Person>>;
    /// Every person, in insertion order.
    async fn list(&self) -> StoreResult<Vec<Person>>;
    async fn update(&self, person: Person) -> StoreResult<Person>;
    /// Returns `false` if nothing was deleted.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
    async fn exists_by_cpf(&self, national_id: &str) -> StoreResult<bool>;
}

/// In-memory repository.
#[derive(Default)]
pub struct MemoryPersonRepository {
    people: RwLock<IndexMap<Uuid, Person>>,
}

impl MemoryPersonRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cpf_taken(people: &IndexMap<Uuid, Person>, national_id: &str, except: Option<Uuid>) -> bool {
    people
        .values()
        .any(|p| p.national_id == national_id && Some(p.id) != except)
}

#[async_trait]
impl PersonRepository for MemoryPersonRepository {
    async fn insert(&self, person: Person) -> StoreResult<Person> {
        let mut people = self.people.write().await;
        if cpf_taken(&people, &person.national_id, None) {
            return Err(StoreError::DuplicateNationalId(person.national_id));
        }
        people.insert(person.id, person.clone());
        Ok(person)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Person>> {
        Ok(self.people.read().await.get(&id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Person>> {
        Ok(self.people.read().await.values().cloned().collect())
    }

    async fn update(&self, person: Person) -> StoreResult<Person> {
        let mut people = self.people.write().await;
        if !people.contains_key(&person.id) {
            return Err(StoreError::NotFound(person.id.to_string()));
        }
        if cpf_taken(&people, &person.national_id, Some(person.id)) {
            return Err(StoreError::DuplicateNationalId(person.national_id));
        }
        people.insert(person.id, person.clone());
        Ok(person)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.people.write().await.shift_remove(&id).is_some())
    }

    async fn exists_by_cpf(&self, national_id: &str) -> StoreResult<bool> {
        Ok(cpf_taken(&*self.people.read().await, national_id, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PersonCreationRequest;
    use chrono::NaiveDate;

    fn person(cpf: &str) -> Person {
        Person::new(PersonCreationRequest {
            name: "Ana".into(),
            email: None,
            national_id: cpf.into(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            phone: None,
            place_of_birth: None,
            nationality: None,
            sex: None,
            address: None,
        })
    }

    #[tokio::test]
    async fn test_unique_cpf() {
        let repo = MemoryPersonRepository::new();
        repo.insert(person("11144477735")).await.unwrap();

        let err = repo.insert(person("11144477735")).await.unwrap_err();
        assert_eq!(err, StoreError::DuplicateNationalId("11144477735".into()));
        assert!(repo.exists_by_cpf("11144477735").await.unwrap());
        assert!(!repo.exists_by_cpf("52998224725").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_keeps_own_cpf() {
        let repo = MemoryPersonRepository::new();
        let mut stored = repo.insert(person("11144477735")).await.unwrap();

        stored.name = "Ana Maria".into();
        let updated = repo.update(stored).await.unwrap();
        assert_eq!(updated.name, "Ana Maria");
    }

    #[tokio::test]
    async fn test_update_missing_person() {
        let repo = MemoryPersonRepository::new();
        let err = repo.update(person("11144477735")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let repo = MemoryPersonRepository::new();
        let a = repo.insert(person("11144477735")).await.unwrap();
        repo.insert(person("52998224725")).await.unwrap();

        assert!(repo.delete(a.id).await.unwrap());
        assert!(!repo.delete(a.id).await.unwrap());

        let left = repo.list().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].national_id, "52998224725");
    }
}
