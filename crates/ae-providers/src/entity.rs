//! Entity lookups through the storage capability

use std::sync::Arc;

use ae_core::{codes, ErrorData};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::dependencies::EntityLookup;
use crate::error::{ProviderError, ProviderResult};
use crate::parse::{as_object, BuildResult};
use crate::provider::{BoxedProvider, Provider, ProviderContext};
use crate::ProviderBuilder;

/// Parsed `entityObject` configuration
#[derive(Debug, Clone)]
pub struct EntityObjectBuilder {
    pub entity_type: Box<ProviderBuilder>,
    pub entity_id: Box<ProviderBuilder>,
}

impl EntityObjectBuilder {
    pub fn parse(body: &Value) -> BuildResult<Self> {
        const KIND: &str = "entityObject";
        let object = as_object(body, KIND)?;
        Ok(Self {
            entity_type: Box::new(ProviderBuilder::parse_required(object, "entityType", KIND)?),
            entity_id: Box::new(ProviderBuilder::parse_required(object, "entityId", KIND)?),
        })
    }
}

/// Loads an entity of the invocation's tenant
pub struct EntityObject {
    entities: Arc<dyn EntityLookup>,
    entity_type: BoxedProvider,
    entity_id: BoxedProvider,
}

impl EntityObject {
    pub fn new(
        entities: Arc<dyn EntityLookup>,
        entity_type: BoxedProvider,
        entity_id: BoxedProvider,
    ) -> Self {
        Self {
            entities,
            entity_type,
            entity_id,
        }
    }
}

impl std::fmt::Debug for EntityObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityObject")
            .field("entity_type", &self.entity_type)
            .field("entity_id", &self.entity_id)
            .finish()
    }
}

#[async_trait]
impl Provider for EntityObject {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let entity_type = ctx.resolve_text(self.entity_type.as_ref()).await?;
        let entity_id = ctx.resolve_text(self.entity_id.as_ref()).await?;
        let details = [
            format!("Entity Type: {}", entity_type),
            format!("Entity ID: {}", entity_id),
        ];

        let tenant = ctx.data.system.tenant.clone();
        match self.entities.find(&tenant, &entity_type, &entity_id).await {
            Ok(Some(entity)) => Ok(entity),
            Ok(None) => {
                debug!(%entity_type, %entity_id, "Entity not found");
                Err(ProviderError::EntityNotFound(
                    ErrorData::new(
                        codes::ENTITY_NOT_FOUND,
                        "Entity not found",
                        format!("No {} with the ID \"{}\" was found.", entity_type, entity_id),
                        404,
                    )
                    .with_details(details),
                ))
            }
            Err(error) => Err(ProviderError::Capability(error.with_details(details))),
        }
    }
}
