//! The [`Warehouse`] handle, a shared connection with one method per
//! operation.

use std::{path::Path, sync::Arc};

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use warehouse_core::Id;

use crate::{
    cond::Comparison,
    config::WarehouseConfig,
    data::Value,
    filter::MeasurementFilter,
    lookup,
    models::{
        GroupInstance, GroupTypeMapping, Measurement, MeasurementGroupMeta, MeasurementTypeInfo,
        Participant,
    },
    reader::{self, GroupInstanceQuery},
    writer::{self, GroupInstanceRequest, InsertFailure},
    WarehouseResult,
};

/// Primary entry point for interacting with a warehouse database.
///
/// Clones share one connection; each call locks it for the duration of the
/// operation.
#[derive(Clone)]
pub struct Warehouse {
    connection: Arc<Mutex<Connection>>,
    connection_path: String,
}

impl Warehouse {
    /// Opens the database file at `path` for reading and writing.
    pub fn open(path: impl AsRef<Path>) -> WarehouseResult<Self> {
        Self::open_with_config(&WarehouseConfig::new(
            path.as_ref().to_string_lossy().to_string(),
        ))
    }

    /// Opens the database described by `config`.
    pub fn open_with_config(config: &WarehouseConfig) -> WarehouseResult<Self> {
        let connection = config.open_connection()?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            connection_path: config.path.clone(),
        })
    }

    /// Wraps an already configured connection.
    pub fn from_connection(connection: Connection) -> Self {
        let connection_path = connection.path().unwrap_or_default().to_string();
        Self {
            connection: Arc::new(Mutex::new(connection)),
            connection_path,
        }
    }

    /// Returns the filesystem path used to open this connection.
    pub fn connection_path(&self) -> &str {
        &self.connection_path
    }

    /// Locks and returns the underlying SQLite connection, e.g. to run several
    /// inserts inside one caller-owned transaction with
    /// [`writer::insert_group_instance`]`(&mut tx, ..)`.
    ///
    /// Every other call on this handle or any of its clones blocks until the
    /// guard is dropped. The lock is not reentrant, so calling another
    /// `Warehouse` method on the same thread while holding the guard
    /// deadlocks.
    ///
    /// ```no_run
    /// # use warehouse_client::{prelude::*, writer};
    /// # fn run(db: &Warehouse, requests: &[GroupInstanceRequest]) -> WarehouseResult<()> {
    /// let mut connection = db.connection();
    /// let mut tx = connection.transaction()?;
    /// for request in requests {
    ///     writer::insert_group_instance(&mut tx, request).ok();
    /// }
    /// tx.commit()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock()
    }

    /// Writes one measurement-group instance atomically and returns its id.
    pub fn insert_measurement_group(
        &self,
        request: &GroupInstanceRequest,
    ) -> Result<Id, InsertFailure> {
        writer::insert_group_instance(&mut *self.connection.lock(), request)
    }

    /// Writes a batch of instances, reporting one outcome per request.
    pub fn import_measurement_groups(
        &self,
        requests: &[GroupInstanceRequest],
    ) -> WarehouseResult<Vec<Result<Id, InsertFailure>>> {
        writer::import_group_instances(&mut self.connection.lock(), requests)
    }

    /// Every measurement matching `filter`, ordered by id.
    pub fn get_measurements(&self, filter: &MeasurementFilter) -> WarehouseResult<Vec<Measurement>> {
        reader::get_measurements(&*self.connection.lock(), filter)
    }

    /// Measurements of the filter's type whose value satisfies `comparison`.
    pub fn get_measurements_with_value_test(
        &self,
        filter: &MeasurementFilter,
        comparison: &Comparison,
    ) -> WarehouseResult<Vec<Measurement>> {
        reader::get_measurements_with_value_test(&*self.connection.lock(), filter, comparison)
    }

    /// Measurements matching `filter` recorded for any of `participants`.
    pub fn get_measurements_for_cohort(
        &self,
        participants: &[Id],
        filter: &MeasurementFilter,
    ) -> WarehouseResult<Vec<Measurement>> {
        reader::get_measurements_for_cohort(&*self.connection.lock(), participants, filter)
    }

    /// Applies an SQL aggregate to the values of the filter's measurement type.
    pub fn aggregate_measurements(
        &self,
        filter: &MeasurementFilter,
        aggregation: &str,
    ) -> WarehouseResult<Option<Value>> {
        reader::aggregate_measurements(&*self.connection.lock(), filter, aggregation)
    }

    /// Reassembled instances that pass every value test of `query`.
    pub fn get_group_instances(
        &self,
        query: &GroupInstanceQuery,
    ) -> WarehouseResult<Vec<GroupInstance>> {
        reader::get_group_instances(&*self.connection.lock(), query)
    }

    /// Like [`Warehouse::get_group_instances`] for an explicit cohort.
    pub fn get_group_instances_for_cohort(
        &self,
        participants: &[Id],
        query: &GroupInstanceQuery,
    ) -> WarehouseResult<Vec<GroupInstance>> {
        reader::get_group_instances_for_cohort(&*self.connection.lock(), participants, query)
    }

    /// Description, value type and units of a measurement type.
    pub fn measurement_type_info(
        &self,
        study: Id,
        measurement_type: Id,
    ) -> WarehouseResult<MeasurementTypeInfo> {
        lookup::measurement_type_info(&*self.connection.lock(), study, measurement_type)
    }

    /// Resolves a study from its external label.
    pub fn study_by_label(&self, label: &str) -> WarehouseResult<Id> {
        lookup::study_by_label(&*self.connection.lock(), label)
    }

    /// Resolves a measurement group from its description.
    pub fn measurement_group_by_label(&self, study: Id, label: &str) -> WarehouseResult<Id> {
        lookup::measurement_group_by_label(&*self.connection.lock(), study, label)
    }

    /// Maps a study-local participant id onto its warehouse id.
    pub fn participant_by_local_id(&self, study: Id, local_id: &str) -> WarehouseResult<Id> {
        lookup::participant_by_local_id(&*self.connection.lock(), study, local_id)
    }

    /// Maps a warehouse participant id onto its study-local id.
    pub fn participant_local_id(&self, study: Id, participant: Id) -> WarehouseResult<String> {
        lookup::participant_local_id(&*self.connection.lock(), study, participant)
    }

    /// Every participant of `study`, ordered by id.
    pub fn participants(&self, study: Id) -> WarehouseResult<Vec<Participant>> {
        lookup::participants(&*self.connection.lock(), study)
    }

    /// Measurement groups of `study`, ordered by id.
    pub fn measurement_groups(&self, study: Id) -> WarehouseResult<Vec<MeasurementGroupMeta>> {
        lookup::measurement_groups(&*self.connection.lock(), study)
    }

    /// Measurement types of a group, ascending.
    pub fn type_ids_in_measurement_group(
        &self,
        study: Id,
        measurement_group: Id,
    ) -> WarehouseResult<Vec<Id>> {
        lookup::type_ids_in_measurement_group(&*self.connection.lock(), study, measurement_group)
    }

    /// Names the types carry within a group, in type id order.
    pub fn types_in_measurement_group(
        &self,
        study: Id,
        measurement_group: Id,
    ) -> WarehouseResult<Vec<String>> {
        lookup::types_in_measurement_group(&*self.connection.lock(), study, measurement_group)
    }

    /// Number of measurement types mapped into a group.
    pub fn num_types_in_measurement_group(
        &self,
        study: Id,
        measurement_group: Id,
    ) -> WarehouseResult<usize> {
        lookup::num_types_in_measurement_group(&*self.connection.lock(), study, measurement_group)
    }

    /// Every group-to-type mapping of `study`, ordered by group then type.
    pub fn measurement_groups_and_types(&self, study: Id) -> WarehouseResult<Vec<GroupTypeMapping>> {
        lookup::measurement_groups_and_types(&*self.connection.lock(), study)
    }

    /// Ids of every stored instance of a group, ascending.
    pub fn group_instance_ids(&self, study: Id, measurement_group: Id) -> WarehouseResult<Vec<Id>> {
        lookup::group_instance_ids(&*self.connection.lock(), study, measurement_group)
    }

    /// Number of stored instances of a group.
    pub fn count_group_instances(&self, study: Id, measurement_group: Id) -> WarehouseResult<usize> {
        lookup::count_group_instances(&*self.connection.lock(), study, measurement_group)
    }

    /// The distinct participants appearing in `measurements`, sorted.
    pub fn participants_in_result(measurements: &[Measurement]) -> Vec<Id> {
        reader::participants_in_result(measurements)
    }
}
