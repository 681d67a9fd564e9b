//! DynamoDB table planning

use ensureflow_core::kinds::table::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, LocalSecondaryIndex,
    Projection, ProvisionedThroughput, SseSpecification, StreamSpecification,
    TimeToLiveSpecification,
};
use ensureflow_core::{DesiredState, ResourceKind, TableSpec, Tag};

use super::{diff_tags, format_option, format_tags};
use crate::action::{ActionType, PropertyChange, Violation};
use crate::provider::ResourceModel;

/// Marker for the table resource kind
#[derive(Debug, Clone, Copy, Default)]
pub struct Table;

/// Observed state of an existing table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableLive {
    pub arn: String,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub key_schema: Vec<KeySchemaElement>,
    pub billing_mode: Option<BillingMode>,
    pub provisioned_throughput: ProvisionedThroughput,
    pub stream_specification: StreamSpecification,
    pub sse_specification: SseSpecification,
    pub local_secondary_indexes: Vec<LocalSecondaryIndex>,
    pub global_secondary_indexes: Vec<GlobalSecondaryIndex>,
    pub tags: Vec<Tag>,
    pub time_to_live: TimeToLiveSpecification,
}

impl TableLive {
    fn billing_mode(&self) -> BillingMode {
        // 課金モードを返さない古いテーブルはプロビジョンド
        self.billing_mode.unwrap_or(BillingMode::Provisioned)
    }

    fn global_index(&self, name: &str) -> Option<&GlobalSecondaryIndex> {
        self.global_secondary_indexes
            .iter()
            .find(|index| index.index_name == name)
    }
}

/// One DynamoDB call that converges a table property
#[derive(Debug, Clone, PartialEq)]
pub enum TableChange {
    /// UpdateTable with billing mode and table throughput
    Throughput {
        billing_mode: BillingMode,
        throughput: ProvisionedThroughput,
    },
    /// UpdateTable with a stream specification
    Stream(StreamSpecification),
    /// UpdateTable creating a global secondary index
    CreateGlobalIndex {
        index: GlobalSecondaryIndex,
        attribute_definitions: Vec<AttributeDefinition>,
    },
    /// UpdateTable changing a global secondary index's throughput
    UpdateGlobalIndex {
        index_name: String,
        throughput: ProvisionedThroughput,
    },
    /// UpdateTable deleting a global secondary index
    DeleteGlobalIndex { index_name: String },
    TagResource(Vec<Tag>),
    UntagResource(Vec<String>),
    /// UpdateTimeToLive
    TimeToLive { attribute_name: String, enabled: bool },
}

impl ResourceModel for Table {
    type Spec = TableSpec;
    type Live = TableLive;
    type Change = TableChange;

    const KIND: ResourceKind = ResourceKind::Table;

    fn diff(
        desired: &DesiredState,
        spec: &TableSpec,
        live: &TableLive,
    ) -> Result<Vec<PropertyChange<TableChange>>, Violation> {
        check_key_schema(desired, spec, live)?;
        check_sse(desired, spec, live)?;
        check_local_indexes(desired, spec, live)?;

        let mut changes = Vec::new();
        diff_throughput(desired, spec, live, &mut changes)?;
        diff_stream(desired, spec, live, &mut changes)?;
        diff_global_indexes(desired, spec, live, &mut changes)?;
        diff_table_tags(desired, spec, live, &mut changes);
        diff_time_to_live(desired, spec, live, &mut changes);
        Ok(changes)
    }

    fn check_create(spec: &TableSpec) -> Result<(), Violation> {
        if spec.billing_mode != BillingMode::Provisioned {
            return Ok(());
        }
        require_units("ProvisionedThroughput", &spec.provisioned_throughput)?;
        for index in &spec.global_secondary_indexes {
            require_units(
                format!("GlobalSecondaryIndexes.{}.ProvisionedThroughput", index.index_name),
                &index.provisioned_throughput,
            )?;
        }
        Ok(())
    }
}

fn format_keys(keys: &[KeySchemaElement]) -> String {
    keys.iter()
        .map(|key| format!("{}:{}", key.attribute_name, key.key_type.as_str()))
        .collect::<Vec<_>>()
        .join(",")
}

fn format_throughput(mode: BillingMode, throughput: &ProvisionedThroughput) -> String {
    match mode {
        BillingMode::PayPerRequest => mode.as_str().to_string(),
        BillingMode::Provisioned => format!(
            "{} read={} write={}",
            mode.as_str(),
            format_option(throughput.read_capacity_units),
            format_option(throughput.write_capacity_units)
        ),
    }
}

fn format_projection(projection: &Projection) -> String {
    let kind = projection
        .projection_type
        .map_or("-", |projection_type| projection_type.as_str());
    if projection.non_key_attributes.is_empty() {
        kind.to_string()
    } else {
        format!("{}({})", kind, projection.non_key_attributes.join(","))
    }
}

fn same_projection(desired: &Projection, live: &Projection) -> bool {
    let mut desired_attributes = desired.non_key_attributes.clone();
    let mut live_attributes = live.non_key_attributes.clone();
    desired_attributes.sort();
    live_attributes.sort();
    desired.projection_type == live.projection_type && desired_attributes == live_attributes
}

/// Supplied units overlaid on the live ones
fn merged_throughput(
    desired: &ProvisionedThroughput,
    live: &ProvisionedThroughput,
) -> ProvisionedThroughput {
    ProvisionedThroughput {
        read_capacity_units: desired.read_capacity_units.or(live.read_capacity_units),
        write_capacity_units: desired.write_capacity_units.or(live.write_capacity_units),
    }
}

/// Provisioned capacity is only accepted with both units
fn require_units(
    property: impl Into<String>,
    throughput: &ProvisionedThroughput,
) -> Result<(), Violation> {
    if throughput.read_capacity_units.is_some() && throughput.write_capacity_units.is_some() {
        return Ok(());
    }
    Err(Violation::new(
        property,
        format!(
            "provisioned capacity needs both read and write units (read={} write={})",
            format_option(throughput.read_capacity_units),
            format_option(throughput.write_capacity_units)
        ),
    ))
}

fn check_key_schema(
    desired: &DesiredState,
    spec: &TableSpec,
    live: &TableLive,
) -> Result<(), Violation> {
    if desired.is_supplied("KeySchema") && spec.key_schema != live.key_schema {
        return Err(Violation::new(
            "KeySchema",
            format!(
                "key schema cannot be changed on an existing table ({} -> {})",
                format_keys(&live.key_schema),
                format_keys(&spec.key_schema)
            ),
        ));
    }
    Ok(())
}

fn check_sse(desired: &DesiredState, spec: &TableSpec, live: &TableLive) -> Result<(), Violation> {
    if !desired.is_supplied("SSESpecification") {
        return Ok(());
    }

    let wanted = &spec.sse_specification;
    let current = &live.sse_specification;
    let enabled_differs = wanted
        .enabled
        .is_some_and(|enabled| enabled != current.enabled.unwrap_or(false));
    let type_differs = wanted.sse_type.is_some() && wanted.sse_type != current.sse_type;
    if enabled_differs || type_differs {
        return Err(Violation::new(
            "SSESpecification",
            "server-side encryption can only be set at table creation",
        ));
    }
    Ok(())
}

fn check_local_indexes(
    desired: &DesiredState,
    spec: &TableSpec,
    live: &TableLive,
) -> Result<(), Violation> {
    if !desired.is_supplied("LocalSecondaryIndexes") {
        return Ok(());
    }

    for index in &spec.local_secondary_indexes {
        match live
            .local_secondary_indexes
            .iter()
            .find(|l| l.index_name == index.index_name)
        {
            None => {
                return Err(Violation::new(
                    format!("LocalSecondaryIndexes.{}", index.index_name),
                    "local secondary indexes cannot be added to an existing table",
                ));
            }
            Some(current)
                if current.key_schema != index.key_schema
                    || !same_projection(&index.projection, &current.projection) =>
            {
                return Err(Violation::new(
                    format!("LocalSecondaryIndexes.{}", index.index_name),
                    "local secondary indexes cannot be altered",
                ));
            }
            Some(_) => {}
        }
    }

    if let Some(removed) = live.local_secondary_indexes.iter().find(|current| {
        !spec
            .local_secondary_indexes
            .iter()
            .any(|index| index.index_name == current.index_name)
    }) {
        return Err(Violation::new(
            format!("LocalSecondaryIndexes.{}", removed.index_name),
            "local secondary indexes cannot be removed from an existing table",
        ));
    }
    Ok(())
}

fn diff_throughput(
    desired: &DesiredState,
    spec: &TableSpec,
    live: &TableLive,
    changes: &mut Vec<PropertyChange<TableChange>>,
) -> Result<(), Violation> {
    // BillingMode はスループット指定からの推論でのみ指定扱いになる
    if !desired.is_supplied("BillingMode") && !desired.is_supplied("ProvisionedThroughput") {
        return Ok(());
    }

    let live_mode = live.billing_mode();
    let throughput = match spec.billing_mode {
        BillingMode::Provisioned => {
            merged_throughput(&spec.provisioned_throughput, &live.provisioned_throughput)
        }
        BillingMode::PayPerRequest => ProvisionedThroughput::default(),
    };
    let unchanged = live_mode == spec.billing_mode
        && (spec.billing_mode == BillingMode::PayPerRequest
            || throughput == live.provisioned_throughput);
    if unchanged {
        return Ok(());
    }
    // オンデマンドのテーブルには補える値が無い
    if spec.billing_mode == BillingMode::Provisioned {
        require_units("ProvisionedThroughput", &throughput)?;
    }

    changes.push(PropertyChange::update(
        "BillingMode",
        format_throughput(live_mode, &live.provisioned_throughput),
        format_throughput(spec.billing_mode, &throughput),
        TableChange::Throughput {
            billing_mode: spec.billing_mode,
            throughput,
        },
    ));
    Ok(())
}

fn diff_stream(
    desired: &DesiredState,
    spec: &TableSpec,
    live: &TableLive,
    changes: &mut Vec<PropertyChange<TableChange>>,
) -> Result<(), Violation> {
    if !desired.is_supplied("StreamSpecification") {
        return Ok(());
    }

    let wanted = &spec.stream_specification;
    let current = &live.stream_specification;
    let format = |stream: &StreamSpecification| match (stream.stream_enabled, stream.stream_view_type) {
        (true, Some(view)) => view.as_str().to_string(),
        (true, None) => "enabled".to_string(),
        (false, _) => "disabled".to_string(),
    };

    if wanted.stream_enabled && current.stream_enabled {
        if wanted.stream_view_type.is_some() && wanted.stream_view_type != current.stream_view_type
        {
            return Err(Violation::new(
                "StreamSpecification.StreamViewType",
                format!(
                    "stream view type cannot be changed while the stream is enabled ({} -> {}); disable the stream first",
                    format(current),
                    format(wanted)
                ),
            ));
        }
        return Ok(());
    }

    if wanted.stream_enabled != current.stream_enabled {
        changes.push(PropertyChange::update(
            "StreamSpecification",
            format(current),
            format(wanted),
            TableChange::Stream(wanted.clone()),
        ));
    }
    Ok(())
}

fn diff_global_indexes(
    desired: &DesiredState,
    spec: &TableSpec,
    live: &TableLive,
    changes: &mut Vec<PropertyChange<TableChange>>,
) -> Result<(), Violation> {
    if !desired.is_supplied("GlobalSecondaryIndexes") {
        return Ok(());
    }

    for index in &spec.global_secondary_indexes {
        let property = format!("GlobalSecondaryIndexes.{}", index.index_name);
        match live.global_index(&index.index_name) {
            None => {
                let attribute_definitions = spec
                    .attribute_definitions
                    .iter()
                    .filter(|definition| {
                        index
                            .key_schema
                            .iter()
                            .any(|key| key.attribute_name == definition.attribute_name)
                    })
                    .cloned()
                    .collect();
                changes.push(
                    PropertyChange::update(
                        property,
                        "-",
                        format!(
                            "{} {}",
                            format_keys(&index.key_schema),
                            format_projection(&index.projection)
                        ),
                        TableChange::CreateGlobalIndex {
                            index: index.clone(),
                            attribute_definitions,
                        },
                    )
                    .with_type(ActionType::Create),
                );
            }
            Some(current) => {
                if current.key_schema != index.key_schema {
                    return Err(Violation::new(
                        property,
                        format!(
                            "global index key schema cannot be changed ({} -> {}); delete and recreate the index",
                            format_keys(&current.key_schema),
                            format_keys(&index.key_schema)
                        ),
                    ));
                }
                if !same_projection(&index.projection, &current.projection) {
                    return Err(Violation::new(
                        property,
                        format!(
                            "global index projection cannot be changed ({} -> {}); delete and recreate the index",
                            format_projection(&current.projection),
                            format_projection(&index.projection)
                        ),
                    ));
                }

                if index.provisioned_throughput.is_empty() {
                    continue;
                }
                let throughput = merged_throughput(
                    &index.provisioned_throughput,
                    &current.provisioned_throughput,
                );
                if throughput != current.provisioned_throughput {
                    require_units(format!("{}.ProvisionedThroughput", property), &throughput)?;
                    changes.push(PropertyChange::update(
                        format!("{}.ProvisionedThroughput", property),
                        format_throughput(BillingMode::Provisioned, &current.provisioned_throughput),
                        format_throughput(BillingMode::Provisioned, &throughput),
                        TableChange::UpdateGlobalIndex {
                            index_name: index.index_name.clone(),
                            throughput,
                        },
                    ));
                }
            }
        }
    }

    for current in &live.global_secondary_indexes {
        if spec.global_index(&current.index_name).is_none() {
            changes.push(
                PropertyChange::update(
                    format!("GlobalSecondaryIndexes.{}", current.index_name),
                    format_keys(&current.key_schema),
                    "-",
                    TableChange::DeleteGlobalIndex {
                        index_name: current.index_name.clone(),
                    },
                )
                .with_type(ActionType::Delete),
            );
        }
    }
    Ok(())
}

fn diff_table_tags(
    desired: &DesiredState,
    spec: &TableSpec,
    live: &TableLive,
    changes: &mut Vec<PropertyChange<TableChange>>,
) {
    if !desired.is_supplied("Tags") {
        return;
    }

    let (upserts, removals) = diff_tags(&spec.tags, &live.tags);
    if !upserts.is_empty() {
        changes.push(PropertyChange::update(
            "Tags",
            format_tags(&live.tags),
            format_tags(&upserts),
            TableChange::TagResource(upserts),
        ));
    }
    if !removals.is_empty() {
        changes.push(
            PropertyChange::update(
                "Tags",
                removals.join(","),
                "-",
                TableChange::UntagResource(removals),
            )
            .with_type(ActionType::Delete),
        );
    }
}

fn diff_time_to_live(
    desired: &DesiredState,
    spec: &TableSpec,
    live: &TableLive,
    changes: &mut Vec<PropertyChange<TableChange>>,
) {
    if !desired.is_supplied("TimeToLiveSpecification") {
        return;
    }

    let wanted = &spec.time_to_live_specification;
    let current = &live.time_to_live;
    let live_enabled = current.enabled.unwrap_or(false);
    let live_name = current.attribute_name.clone().unwrap_or_default();
    let format = |enabled: bool, name: &str| {
        if enabled {
            format!("enabled({})", name)
        } else {
            "disabled".to_string()
        }
    };

    match (wanted.enabled.unwrap_or(false), wanted.attribute_name.as_deref()) {
        (true, Some(name)) => {
            if live_enabled && live_name == name {
                return;
            }
            // 有効な TTL の属性を変えるには一度無効化する
            if live_enabled {
                changes.push(PropertyChange::update(
                    "TimeToLiveSpecification",
                    format(true, &live_name),
                    format(false, &live_name),
                    TableChange::TimeToLive {
                        attribute_name: live_name.clone(),
                        enabled: false,
                    },
                ));
            }
            changes.push(PropertyChange::update(
                "TimeToLiveSpecification",
                format(false, ""),
                format(true, name),
                TableChange::TimeToLive {
                    attribute_name: name.to_string(),
                    enabled: true,
                },
            ));
        }
        (false, _) if live_enabled => {
            changes.push(PropertyChange::update(
                "TimeToLiveSpecification",
                format(true, &live_name),
                format(false, &live_name),
                TableChange::TimeToLive {
                    attribute_name: live_name.clone(),
                    enabled: false,
                },
            ));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensureflow_core::compile;
    use ensureflow_core::kinds::table::{AttributeType, KeyType, ProjectionType, StreamViewType};

    fn plan(tokens: &[&str], live: &TableLive) -> Result<Vec<PropertyChange<TableChange>>, Violation> {
        let desired = compile(ResourceKind::Table, "orders", tokens).unwrap();
        let spec: TableSpec = desired.decode().unwrap();
        Table::diff(&desired, &spec, live)
    }

    fn key(name: &str, key_type: KeyType) -> KeySchemaElement {
        KeySchemaElement {
            attribute_name: name.to_string(),
            key_type,
        }
    }

    fn live_table() -> TableLive {
        TableLive {
            arn: "arn:aws:dynamodb:us-east-1:123456789012:table/orders".to_string(),
            attribute_definitions: vec![AttributeDefinition {
                attribute_name: "id".to_string(),
                attribute_type: AttributeType::S,
            }],
            key_schema: vec![key("id", KeyType::Hash)],
            billing_mode: Some(BillingMode::PayPerRequest),
            ..TableLive::default()
        }
    }

    #[test]
    fn test_matching_table_has_no_changes() {
        let changes = plan(&["id:s:hash"], &live_table()).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_unsupplied_properties_are_untouched() {
        let mut live = live_table();
        live.billing_mode = Some(BillingMode::Provisioned);
        live.provisioned_throughput = ProvisionedThroughput::new(5, 5);
        live.stream_specification = StreamSpecification {
            stream_enabled: true,
            stream_view_type: Some(StreamViewType::NewImage),
        };
        live.tags = vec![Tag::new("env", "prod")];

        // 既定値 (PAY_PER_REQUEST, StreamEnabled=false) で既存の設定を戻さない
        let changes = plan(&[], &live).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_switch_to_provisioned() {
        let changes = plan(&["read=10", "write=5"], &live_table()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].property, "BillingMode");
        assert_eq!(changes[0].from, "PAY_PER_REQUEST");
        assert_eq!(changes[0].to, "PROVISIONED read=10 write=5");
        assert_eq!(
            changes[0].change,
            TableChange::Throughput {
                billing_mode: BillingMode::Provisioned,
                throughput: ProvisionedThroughput::new(10, 5),
            }
        );
    }

    #[test]
    fn test_partial_throughput_keeps_live_units() {
        let mut live = live_table();
        live.billing_mode = Some(BillingMode::Provisioned);
        live.provisioned_throughput = ProvisionedThroughput::new(5, 5);

        let changes = plan(&["read=20"], &live).unwrap();
        assert_eq!(
            changes[0].change,
            TableChange::Throughput {
                billing_mode: BillingMode::Provisioned,
                throughput: ProvisionedThroughput::new(20, 5),
            }
        );

        assert!(plan(&["read=5"], &live).unwrap().is_empty());
    }

    #[test]
    fn test_half_throughput_on_demand_table_is_violation() {
        // live_table() はオンデマンドなので write を補えない
        let err = plan(&["read=10"], &live_table()).unwrap_err();
        assert_eq!(err.property, "ProvisionedThroughput");
        assert!(err.reason.contains("read=10 write=-"));

        let err = plan(&["BillingMode=PROVISIONED"], &live_table()).unwrap_err();
        assert_eq!(err.property, "ProvisionedThroughput");
    }

    #[test]
    fn test_check_create_requires_both_units() {
        let spec = |tokens: &[&str]| -> TableSpec {
            compile(ResourceKind::Table, "orders", tokens)
                .unwrap()
                .decode()
                .unwrap()
        };

        let err = Table::check_create(&spec(&["id:s:hash", "write=5"])).unwrap_err();
        assert_eq!(err.property, "ProvisionedThroughput");

        assert!(Table::check_create(&spec(&["id:s:hash", "read=5", "write=5"])).is_ok());
        assert!(Table::check_create(&spec(&["id:s:hash"])).is_ok());

        let err = Table::check_create(&spec(&[
            "id:s:hash",
            "read=5",
            "write=5",
            "GlobalSecondaryIndexes.0.IndexName=by-user",
            "GlobalSecondaryIndexes.0.Key.0=user:s:hash",
            "GlobalSecondaryIndexes.0.ProvisionedThroughput.ReadCapacityUnits=1",
        ]))
        .unwrap_err();
        assert_eq!(err.property, "GlobalSecondaryIndexes.by-user.ProvisionedThroughput");
    }

    #[test]
    fn test_key_schema_change_is_violation() {
        let err = plan(&["userid:s:hash"], &live_table()).unwrap_err();
        assert_eq!(err.property, "KeySchema");
    }

    #[test]
    fn test_stream_view_change_is_violation() {
        let mut live = live_table();
        live.stream_specification = StreamSpecification {
            stream_enabled: true,
            stream_view_type: Some(StreamViewType::NewImage),
        };

        let err = plan(&["stream=keys_only"], &live).unwrap_err();
        assert_eq!(err.property, "StreamSpecification.StreamViewType");

        assert!(plan(&["stream=new_image"], &live).unwrap().is_empty());
    }

    #[test]
    fn test_stream_enable_and_disable() {
        let changes = plan(&["stream=new_and_old_images"], &live_table()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].from, "disabled");
        assert_eq!(changes[0].to, "NEW_AND_OLD_IMAGES");

        let mut live = live_table();
        live.stream_specification = StreamSpecification {
            stream_enabled: true,
            stream_view_type: Some(StreamViewType::KeysOnly),
        };
        let changes = plan(&["StreamSpecification.StreamEnabled=false"], &live).unwrap();
        assert_eq!(
            changes[0].change,
            TableChange::Stream(StreamSpecification {
                stream_enabled: false,
                stream_view_type: None,
            })
        );
    }

    #[test]
    fn test_sse_change_is_violation() {
        let err = plan(&["SSESpecification.KMSMasterKeyId=alias/mine"], &live_table()).unwrap_err();
        assert_eq!(err.property, "SSESpecification");
    }

    #[test]
    fn test_local_index_addition_is_violation() {
        let err = plan(
            &[
                "LocalSecondaryIndexes.0.IndexName=by-date",
                "LocalSecondaryIndexes.0.Key.0=id:s:hash",
                "LocalSecondaryIndexes.0.Key.1=date:n:range",
            ],
            &live_table(),
        )
        .unwrap_err();
        assert_eq!(err.property, "LocalSecondaryIndexes.by-date");
    }

    #[test]
    fn test_global_index_create_update_delete() {
        let mut live = live_table();
        live.global_secondary_indexes = vec![
            GlobalSecondaryIndex {
                index_name: "by-user".to_string(),
                key_schema: vec![key("user", KeyType::Hash)],
                projection: Projection {
                    projection_type: Some(ProjectionType::All),
                    non_key_attributes: vec![],
                },
                provisioned_throughput: ProvisionedThroughput::new(1, 1),
            },
            GlobalSecondaryIndex {
                index_name: "legacy".to_string(),
                key_schema: vec![key("old", KeyType::Hash)],
                projection: Projection::default(),
                provisioned_throughput: ProvisionedThroughput::default(),
            },
        ];

        let changes = plan(
            &[
                "GlobalSecondaryIndexes.0.IndexName=by-user",
                "GlobalSecondaryIndexes.0.Key.0=user:s:hash",
                "GlobalSecondaryIndexes.0.Projection.ProjectionType=all",
                "GlobalSecondaryIndexes.0.ProvisionedThroughput.ReadCapacityUnits=3",
                "GlobalSecondaryIndexes.1.IndexName=by-date",
                "GlobalSecondaryIndexes.1.Key.0=date:n:hash",
                "GlobalSecondaryIndexes.1.Projection.ProjectionType=keys_only",
            ],
            &live,
        )
        .unwrap();

        let kinds: Vec<_> = changes.iter().map(|c| c.action_type).collect();
        assert_eq!(
            kinds,
            vec![ActionType::Update, ActionType::Create, ActionType::Delete]
        );
        assert_eq!(
            changes[0].change,
            TableChange::UpdateGlobalIndex {
                index_name: "by-user".to_string(),
                throughput: ProvisionedThroughput::new(3, 1),
            }
        );
        match &changes[1].change {
            TableChange::CreateGlobalIndex {
                index,
                attribute_definitions,
            } => {
                assert_eq!(index.index_name, "by-date");
                assert_eq!(attribute_definitions.len(), 1);
                assert_eq!(attribute_definitions[0].attribute_type, AttributeType::N);
            }
            other => panic!("unexpected change: {other:?}"),
        }
        assert_eq!(
            changes[2].change,
            TableChange::DeleteGlobalIndex {
                index_name: "legacy".to_string()
            }
        );
    }

    #[test]
    fn test_global_index_projection_change_is_violation() {
        let mut live = live_table();
        live.global_secondary_indexes = vec![GlobalSecondaryIndex {
            index_name: "by-user".to_string(),
            key_schema: vec![key("user", KeyType::Hash)],
            projection: Projection {
                projection_type: Some(ProjectionType::KeysOnly),
                non_key_attributes: vec![],
            },
            provisioned_throughput: ProvisionedThroughput::default(),
        }];

        let err = plan(
            &[
                "GlobalSecondaryIndexes.0.IndexName=by-user",
                "GlobalSecondaryIndexes.0.Key.0=user:s:hash",
                "GlobalSecondaryIndexes.0.Projection.ProjectionType=all",
            ],
            &live,
        )
        .unwrap_err();
        assert_eq!(err.property, "GlobalSecondaryIndexes.by-user");
    }

    #[test]
    fn test_tags_are_authoritative_when_supplied() {
        let mut live = live_table();
        live.tags = vec![Tag::new("env", "dev"), Tag::new("owner", "ops")];

        let changes = plan(&["Tags.env=prod"], &live).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[0].change,
            TableChange::TagResource(vec![Tag::new("env", "prod")])
        );
        assert_eq!(
            changes[1].change,
            TableChange::UntagResource(vec!["owner".to_string()])
        );
    }

    #[test]
    fn test_time_to_live() {
        let changes = plan(&["ttl=expires"], &live_table()).unwrap();
        assert_eq!(
            changes,
            vec![PropertyChange::update(
                "TimeToLiveSpecification",
                "disabled",
                "enabled(expires)",
                TableChange::TimeToLive {
                    attribute_name: "expires".to_string(),
                    enabled: true,
                },
            )]
        );

        let mut live = live_table();
        live.time_to_live = TimeToLiveSpecification {
            attribute_name: Some("old".to_string()),
            enabled: Some(true),
        };
        let changes = plan(&["ttl=expires"], &live).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[0].change,
            TableChange::TimeToLive {
                attribute_name: "old".to_string(),
                enabled: false,
            }
        );

        let changes = plan(&["TimeToLiveSpecification.Enabled=false"], &live).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].to, "disabled");
    }
}
