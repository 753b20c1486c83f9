//! Model registration pipeline.
//!
//! Table naming, bind-key propagation, and single/joined-table inheritance
//! detection all run as an explicit pipeline: a [`ModelDescriptor`] flows
//! through ordered [`RegistrationStage`]s, each inspecting and optionally
//! mutating the in-flight registration before the model is finalized into
//! the [`ModelRegistry`].
//!
//! Default pipeline order:
//!
//! 1. [`NamingStage`] — decides whether to auto-generate a table name.
//! 2. [`TableStage`] — the table factory: reuse, joined-table, or
//!    single-table inheritance.
//! 3. [`BindStage`] — resolves the effective bind key and stamps it on the
//!    owned table.
//!
//! [`ModelRegistry::with_auto_id`] prepends [`AutoIdStage`], which injects a
//! `BIGINT` primary key into models that declare none.

use std::collections::HashMap;

use crate::entity::Entity;
use crate::error::SchemaError;
use crate::naming::camel_to_snake_case;
use crate::schema::{Column, Metadata, SqlType, Table};

/// How a model declares its table name.
#[derive(Debug, Clone)]
pub enum TableName {
    /// No declaration: the name may be generated or inherited.
    Unset,
    /// An explicit name declared on the model itself.
    Explicit(String),
    /// A name computed at registration time. Like a deferred declaration,
    /// this suppresses auto-generation entirely; descendants re-run the
    /// callback against their own descriptor.
    Computed(fn(&ModelDescriptor) -> String),
}

/// Everything a model declares about itself, before the pipeline runs.
///
/// ```
/// use bindery_core::model::ModelDescriptor;
/// use bindery_core::schema::{Column, SqlType};
///
/// let todo = ModelDescriptor::new("Todo")
///     .table_name("todos")
///     .column(Column::new("id", SqlType::BigInt).primary_key())
///     .column(Column::new("title", SqlType::Varchar(80)));
/// ```
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    name: String,
    parent: Option<String>,
    abstract_: bool,
    table_name: TableName,
    table_prefix: Option<String>,
    bind_key: Option<String>,
    columns: Vec<Column>,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        ModelDescriptor {
            name: name.into(),
            parent: None,
            abstract_: false,
            table_name: TableName::Unset,
            table_prefix: None,
            bind_key: None,
            columns: Vec::new(),
        }
    }

    /// Build a descriptor from a static [`Entity`] implementation.
    pub fn from_entity<E: Entity>() -> Self {
        let mut descriptor = ModelDescriptor::new(E::model_name());
        if let Some(name) = E::table_name() {
            descriptor = descriptor.table_name(name);
        }
        if let Some(prefix) = E::table_prefix() {
            descriptor = descriptor.table_prefix(prefix);
        }
        if let Some(key) = E::bind_key() {
            descriptor = descriptor.bind_key(key);
        }
        descriptor.columns(E::columns())
    }

    /// Inherit from a previously registered model.
    pub fn parent(mut self, name: impl Into<String>) -> Self {
        self.parent = Some(name.into());
        self
    }

    /// Mark the model abstract: it maps no table of its own and only passes
    /// declarations down to children.
    pub fn abstract_model(mut self) -> Self {
        self.abstract_ = true;
        self
    }

    /// Declare an explicit table name.
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = TableName::Explicit(name.into());
        self
    }

    /// Declare a computed table name, resolved against the registering
    /// model's descriptor.
    pub fn computed_table_name(mut self, f: fn(&ModelDescriptor) -> String) -> Self {
        self.table_name = TableName::Computed(f);
        self
    }

    /// Declare a table-name prefix, prepended (snake-cased, no separator) to
    /// generated names of this model and its descendants.
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = Some(prefix.into());
        self
    }

    pub fn bind_key(mut self, key: impl Into<String>) -> Self {
        self.bind_key = Some(key.into());
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_abstract(&self) -> bool {
        self.abstract_
    }

    pub fn declared_table_name(&self) -> &TableName {
        &self.table_name
    }

    pub fn declared_prefix(&self) -> Option<&str> {
        self.table_prefix.as_deref()
    }

    pub fn declared_bind_key(&self) -> Option<&str> {
        self.bind_key.as_deref()
    }

    pub fn declared_columns(&self) -> &[Column] {
        &self.columns
    }
}

/// A finalized model.
#[derive(Debug, Clone)]
pub struct RegisteredModel {
    name: String,
    parent: Option<String>,
    abstract_: bool,
    /// The declaration as written on the model, kept for descendants.
    declared: TableName,
    /// The table-name attribute resolved onto this model itself: generated
    /// or explicitly declared. `None` when inherited, computed, or removed
    /// by single-table-inheritance cleanup.
    table_name: Option<String>,
    table_prefix: Option<String>,
    bind_key: Option<String>,
    columns: Vec<Column>,
    /// The metadata table this model owns, if any.
    table: Option<String>,
}

impl RegisteredModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_abstract(&self) -> bool {
        self.abstract_
    }

    /// The table this model owns. `None` for abstract models and for
    /// single-table-inheritance children, which share an ancestor's table.
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// The table-name attribute left on this model after registration.
    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    /// The effective bind key, own or inherited.
    pub fn bind_key(&self) -> Option<&str> {
        self.bind_key.as_deref()
    }
}

/// One member of a model's resolution chain, most-derived first.
enum ChainMember<'a> {
    Current(&'a ModelDescriptor),
    Ancestor(&'a RegisteredModel),
}

/// In-flight registration state handed to each stage.
pub struct RegistrationContext<'a> {
    pub descriptor: ModelDescriptor,
    pub registry: &'a ModelRegistry,
    pub metadata: &'a mut Metadata,
    /// Resolved table-name attribute (generated or self-declared).
    pub table_name: Option<String>,
    /// Key of the metadata table this model will own.
    pub table: Option<String>,
    /// Effective bind key, filled by [`BindStage`].
    pub bind_key: Option<String>,
}

impl RegistrationContext<'_> {
    /// Ancestors of the registering model, nearest first.
    fn ancestors(&self) -> Vec<&RegisteredModel> {
        let mut chain = Vec::new();
        let mut next = self.descriptor.parent.as_deref();
        while let Some(name) = next {
            match self.registry.model(name) {
                Some(model) => {
                    next = model.parent.as_deref();
                    chain.push(model);
                }
                None => break,
            }
        }
        chain
    }

    fn chain(&self) -> Vec<ChainMember<'_>> {
        let mut chain = vec![ChainMember::Current(&self.descriptor)];
        chain.extend(self.ancestors().into_iter().map(ChainMember::Ancestor));
        chain
    }

    /// Nearest ancestor-owned table, walking through single-table children.
    fn ancestor_table(&self) -> Option<&str> {
        self.ancestors().into_iter().find_map(|m| m.table())
    }

    /// Columns this model's table would hold: declarations inherited from
    /// contiguous abstract ancestors, then its own (own declarations win).
    fn effective_columns(&self) -> Vec<Column> {
        let mut columns: Vec<Column> = Vec::new();
        for ancestor in self.ancestors() {
            if !ancestor.abstract_ {
                // Concrete ancestors keep their columns in their own table.
                break;
            }
            columns.extend(ancestor.columns.iter().cloned());
        }
        let mut merged: Vec<Column> = self.descriptor.columns.clone();
        for column in columns {
            if !merged.iter().any(|c| c.name == column.name) {
                merged.push(column);
            }
        }
        merged
    }
}

/// A composable registration hook.
///
/// Stages run in pipeline order and may inspect or mutate the
/// [`RegistrationContext`] before the model is finalized.
pub trait RegistrationStage {
    fn apply(&self, ctx: &mut RegistrationContext<'_>) -> Result<(), SchemaError>;
}

/// Decide whether a table name should be auto-generated for the registering
/// model.
///
/// - Abstract models never get one.
/// - A computed declaration anywhere in the chain defers naming entirely.
/// - A prefix at or above the declaring member forces generation.
/// - A name declared on the model itself, or on an abstract member, blocks
///   regeneration; a name on a concrete ancestor means the child renames.
/// - No declaration anywhere generates.
fn should_set_table_name(ctx: &RegistrationContext<'_>) -> bool {
    if ctx.descriptor.abstract_ {
        return false;
    }

    let chain = ctx.chain();
    for (idx, member) in chain.iter().enumerate() {
        let (declares, computed, is_current, is_abstract) = match member {
            ChainMember::Current(desc) => (
                !matches!(desc.table_name, TableName::Unset),
                matches!(desc.table_name, TableName::Computed(_)),
                true,
                false,
            ),
            ChainMember::Ancestor(model) => (
                model.table_name.is_some() || matches!(model.declared, TableName::Computed(_)),
                matches!(model.declared, TableName::Computed(_)),
                false,
                model.abstract_,
            ),
        };
        if !declares {
            continue;
        }
        if computed {
            return false;
        }
        // A prefix declared at or above the declaring member forces
        // generation regardless of who declared the name.
        let prefix_above = chain[idx..].iter().any(|m| match m {
            ChainMember::Current(desc) => desc.table_prefix.is_some(),
            ChainMember::Ancestor(model) => model.table_prefix.is_some(),
        });
        if prefix_above {
            return true;
        }
        return !(is_current || is_abstract);
    }

    true
}

/// Resolve the declared table-name attribute visible on the registering
/// model, without generating one.
fn declared_table_name(ctx: &RegistrationContext<'_>) -> Option<(String, bool)> {
    for member in ctx.chain() {
        match member {
            ChainMember::Current(desc) => match &desc.table_name {
                TableName::Explicit(name) => return Some((name.clone(), true)),
                TableName::Computed(f) => return Some((f(&ctx.descriptor), false)),
                TableName::Unset => {}
            },
            ChainMember::Ancestor(model) => {
                if let TableName::Computed(f) = model.declared {
                    return Some((f(&ctx.descriptor), false));
                }
                if let Some(name) = &model.table_name {
                    return Some((name.clone(), false));
                }
            }
        }
    }
    None
}

/// Nearest declared prefix in the chain, snake-cased for generation.
fn nearest_prefix(ctx: &RegistrationContext<'_>) -> Option<String> {
    ctx.chain().into_iter().find_map(|m| match m {
        ChainMember::Current(desc) => desc.table_prefix.clone(),
        ChainMember::Ancestor(model) => model.table_prefix.clone(),
    })
}

/// Injects a `BIGINT` primary key named `id` when neither the model nor its
/// chain declares one.
pub struct AutoIdStage;

impl RegistrationStage for AutoIdStage {
    fn apply(&self, ctx: &mut RegistrationContext<'_>) -> Result<(), SchemaError> {
        if ctx.descriptor.abstract_ {
            return Ok(());
        }
        let has_primary = ctx.descriptor.columns.iter().any(|c| c.primary_key)
            || ctx
                .ancestors()
                .iter()
                .any(|a| a.columns.iter().any(|c| c.primary_key));
        if !has_primary {
            ctx.descriptor
                .columns
                .insert(0, Column::new("id", SqlType::BigInt).primary_key());
        }
        Ok(())
    }
}

/// Applies the naming policy, setting the generated name when one is due.
pub struct NamingStage;

impl RegistrationStage for NamingStage {
    fn apply(&self, ctx: &mut RegistrationContext<'_>) -> Result<(), SchemaError> {
        if !should_set_table_name(ctx) {
            return Ok(());
        }
        let mut name = camel_to_snake_case(&ctx.descriptor.name);
        if let Some(prefix) = nearest_prefix(ctx) {
            name = format!("{}{name}", camel_to_snake_case(&prefix));
        }
        ctx.table_name = Some(name);
        Ok(())
    }
}

/// The table factory: builds, reuses, or skips the storage table.
pub struct TableStage;

impl RegistrationStage for TableStage {
    fn apply(&self, ctx: &mut RegistrationContext<'_>) -> Result<(), SchemaError> {
        if ctx.descriptor.abstract_ {
            // Abstract models keep their declaration for descendants but map
            // no table of their own.
            if let TableName::Explicit(name) = &ctx.descriptor.table_name {
                ctx.table_name = Some(name.clone());
            }
            return Ok(());
        }

        let resolved = match ctx.table_name.clone() {
            Some(generated) => Some((generated, true)),
            None => declared_table_name(ctx),
        };
        let Some((name, self_declared)) = resolved else {
            if ctx.ancestor_table().is_some() {
                // No name anywhere and a parent table exists: plain
                // single-table inheritance.
                return Ok(());
            }
            return Err(SchemaError::MissingTableName(ctx.descriptor.name.clone()));
        };
        if self_declared {
            ctx.table_name = Some(name.clone());
        }

        let columns = ctx.effective_columns();

        // A table of this name already in the metadata: attach to it, which
        // lets reflected or pre-existing tables back a model by name.
        if ctx.metadata.contains_table(&name) {
            if let Some(table) = ctx.metadata.table_mut(&name) {
                table.merge_columns(columns);
            }
            ctx.table = Some(name);
            return Ok(());
        }

        // A primary key of its own: a dedicated table, joined-table
        // inheritance when an ancestor also owns one.
        if columns.iter().any(|c| c.primary_key) {
            ctx.metadata.insert(Table::new(name.clone(), columns));
            ctx.table = Some(name);
            return Ok(());
        }

        if ctx.ancestor_table().is_none() {
            return Err(SchemaError::MissingPrimaryKey(ctx.descriptor.name.clone()));
        }

        // Single-table inheritance: share the ancestor's table and drop any
        // name resolved onto this model.
        ctx.table = None;
        ctx.table_name = None;
        Ok(())
    }
}

/// Resolves the effective bind key and stamps it on the owned table.
pub struct BindStage;

impl RegistrationStage for BindStage {
    fn apply(&self, ctx: &mut RegistrationContext<'_>) -> Result<(), SchemaError> {
        let effective = ctx
            .descriptor
            .bind_key
            .clone()
            .or_else(|| {
                ctx.ancestors()
                    .into_iter()
                    .find_map(|a| a.bind_key.clone())
            });
        if let (Some(table), Some(_)) = (&ctx.table, &effective) {
            if let Some(table) = ctx.metadata.table_mut(table) {
                table.set_bind_key(effective.clone());
            }
        }
        ctx.bind_key = effective;
        Ok(())
    }
}

/// Registry of finalized models and the pipeline that produces them.
pub struct ModelRegistry {
    models: HashMap<String, RegisteredModel>,
    stages: Vec<Box<dyn RegistrationStage + Send + Sync>>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        ModelRegistry::new()
    }
}

impl ModelRegistry {
    /// Registry with the default pipeline: naming, table factory, bind key.
    pub fn new() -> Self {
        ModelRegistry {
            models: HashMap::new(),
            stages: vec![Box::new(NamingStage), Box::new(TableStage), Box::new(BindStage)],
        }
    }

    /// Registry that additionally injects a `BIGINT` `id` primary key into
    /// models declaring none.
    pub fn with_auto_id() -> Self {
        let mut registry = ModelRegistry::new();
        registry.stages.insert(0, Box::new(AutoIdStage));
        registry
    }

    /// Insert a custom stage at the given pipeline position.
    pub fn insert_stage(
        &mut self,
        index: usize,
        stage: Box<dyn RegistrationStage + Send + Sync>,
    ) {
        let index = index.min(self.stages.len());
        self.stages.insert(index, stage);
    }

    /// Run the pipeline for a descriptor and finalize the model.
    pub fn register<'a>(
        &'a mut self,
        descriptor: ModelDescriptor,
        metadata: &mut Metadata,
    ) -> Result<&'a RegisteredModel, SchemaError> {
        if self.models.contains_key(&descriptor.name) {
            return Err(SchemaError::DuplicateModel(descriptor.name.clone()));
        }
        if let Some(parent) = &descriptor.parent {
            if !self.models.contains_key(parent) {
                return Err(SchemaError::UnknownParent {
                    model: descriptor.name.clone(),
                    parent: parent.clone(),
                });
            }
        }

        let mut ctx = RegistrationContext {
            descriptor,
            registry: self,
            metadata,
            table_name: None,
            table: None,
            bind_key: None,
        };
        for stage in &self.stages {
            stage.apply(&mut ctx)?;
        }

        let RegistrationContext {
            descriptor,
            table_name,
            table,
            bind_key,
            ..
        } = ctx;

        tracing::debug!(
            model = %descriptor.name,
            table = table.as_deref().unwrap_or("<inherited>"),
            bind = bind_key.as_deref().unwrap_or("<default>"),
            "registered model"
        );

        let model = RegisteredModel {
            name: descriptor.name.clone(),
            parent: descriptor.parent,
            abstract_: descriptor.abstract_,
            declared: descriptor.table_name,
            table_name,
            table_prefix: descriptor.table_prefix,
            bind_key,
            columns: descriptor.columns,
            table,
        };
        Ok(self.models.entry(descriptor.name).or_insert(model))
    }

    pub fn model(&self, name: &str) -> Option<&RegisteredModel> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// The effective table of a model, walking up through single-table
    /// inheritance to the nearest ancestor that owns one.
    pub fn table_of(&self, name: &str) -> Result<Option<&str>, SchemaError> {
        let mut current = self
            .models
            .get(name)
            .ok_or_else(|| SchemaError::UnknownModel(name.to_string()))?;
        loop {
            if let Some(table) = current.table() {
                return Ok(Some(table));
            }
            match current.parent.as_deref().and_then(|p| self.models.get(p)) {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
    }
}
