/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use crate::domain::{Entity, EntityKind, Filter, Filters, Page, RepositoryError};
use async_trait::async_trait;

/// Result of an upsert
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    /// Stored entity before the write, children included; `None` on insert
    pub before: Option<Entity>,
    /// Stored entity after the write, children included
    pub after: Entity,
}

impl UpsertOutcome {
    pub fn created(&self) -> bool {
        self.before.is_none()
    }
}

/// Secondary port - Inventory persistence
///
/// Implementations are shared across workers and must be safe to call concurrently.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Fetch one entity by primary key
    ///
    /// # Arguments
    /// * `kind` - Entity type
    /// * `key` - Primary key values in key column order
    ///
    /// # Returns
    /// * `Ok(Some(Entity))` - Entity with its child collections
    /// * `Ok(None)` - No such entity
    /// * `Err(RepositoryError)` - Database failure
    async fn get_one(&self, kind: EntityKind, key: &[String])
        -> Result<Option<Entity>, RepositoryError>;

    /// Fetch a page of entities in primary key order, child collections included
    async fn get_all(&self, kind: EntityKind, page: Page) -> Result<Vec<Entity>, RepositoryError>;

    /// Fetch a page of entities matching every filter
    ///
    /// # Arguments
    /// * `kind` - Entity type
    /// * `page` - Offset and limit
    /// * `filters` - Conjunction of filters
    ///
    /// # Returns
    /// * `Ok(Vec<Entity>)` - Matching entities with their child collections
    /// * `Err(RepositoryError::UnknownField)` - A filter names a column the entity lacks
    async fn get_all_by_filters(
        &self,
        kind: EntityKind,
        page: Page,
        filters: &Filters,
    ) -> Result<Vec<Entity>, RepositoryError>;

    /// Count entities matching every filter
    async fn count(&self, kind: EntityKind, filters: &Filters) -> Result<usize, RepositoryError>;

    /// Insert the entity or merge it into the stored one
    ///
    /// Zero-valued fields of the new snapshot keep the stored value. Child
    /// collections are upserted by their own key with the back-reference set;
    /// stored children absent from the snapshot are kept. `updated_at` is set on
    /// every written row.
    ///
    /// # Arguments
    /// * `entity` - New snapshot
    ///
    /// # Returns
    /// * `Ok(UpsertOutcome)` - Pre-image and post-image of the entity
    /// * `Err(RepositoryError)` - Validation or database failure; nothing was written
    async fn update_or_create(&self, entity: Entity) -> Result<UpsertOutcome, RepositoryError>;

    /// Entities of `kind` owned by a chassis
    async fn get_all_by_chassis(
        &self,
        kind: EntityKind,
        chassis_serial: &str,
    ) -> Result<Vec<Entity>, RepositoryError> {
        let filters = Filters::new().with(Filter::is_in("chassis_serial", &[chassis_serial]));
        self.get_all_by_filters(kind, Page::all(), &filters).await
    }

    /// Entities of `kind` owned by a blade
    async fn get_all_by_blade(
        &self,
        kind: EntityKind,
        blade_serial: &str,
    ) -> Result<Vec<Entity>, RepositoryError> {
        let filters = Filters::new().with(Filter::is_in("blade_serial", &[blade_serial]));
        self.get_all_by_filters(kind, Page::all(), &filters).await
    }

    /// Entities of `kind` owned by a discrete server
    async fn get_all_by_discrete(
        &self,
        kind: EntityKind,
        discrete_serial: &str,
    ) -> Result<Vec<Entity>, RepositoryError> {
        let filters = Filters::new().with(Filter::is_in("discrete_serial", &[discrete_serial]));
        self.get_all_by_filters(kind, Page::all(), &filters).await
    }

    /// Device owning a NIC, if any
    async fn get_all_by_nic(&self, mac_address: &str) -> Result<Vec<Entity>, RepositoryError> {
        let Some(Entity::Nic(nic)) = self
            .get_one(EntityKind::Nic, &[mac_address.to_lowercase()])
            .await?
        else {
            return Ok(Vec::new());
        };
        let owner = [
            (EntityKind::Blade, nic.blade_serial),
            (EntityKind::Discrete, nic.discrete_serial),
            (EntityKind::Chassis, nic.chassis_serial),
        ]
        .into_iter()
        .find(|(_, serial)| !serial.is_empty());

        match owner {
            Some((kind, serial)) => Ok(self.get_one(kind, &[serial]).await?.into_iter().collect()),
            None => Ok(Vec::new()),
        }
    }
}
