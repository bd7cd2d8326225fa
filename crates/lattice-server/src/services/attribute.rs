//! The Read/Write engine: attribute dispatch, index-range slicing and the
//! HistoryRead pass-through.

use std::sync::Arc;

use chrono::Utc;
use lattice_ua::service::{
    HistoryReadRequest, HistoryReadResponse, ReadRequest, ReadResponse, ReadValueId,
    ResponseHeader, WriteRequest, WriteResponse, WriteValue,
};
use lattice_ua::{
    access_level, attribute_id, permission, ArrayValue, DataValue, ExtensionObject, Scalar,
    ServiceResponse, StatusCode, TimestampsToReturn, ValueRank, Variant, VariantType,
};
use lattice_project::Node;
use tokio::task::JoinSet;

use crate::channel::Channel;
use crate::context::ServerContext;
use crate::server::bind_session;
use crate::services::user_permitted;
use crate::session::{ServiceKind, Session};

// =============================================================================
// parse_bounds / ranges
// =============================================================================

/// Parses one dimension of an index range against a value of `length`,
/// returning the end-exclusive `(lo, hi)` bounds.
///
/// `lo < 0`, `hi < 0` or `lo >= hi` are invalid; `lo >= length` selects no
/// data; `hi` clamps to the last index. An empty dimension selects
/// everything.
pub fn parse_bounds(s: &str, length: usize) -> Result<(usize, usize), StatusCode> {
    if length == 0 {
        return Err(StatusCode::BAD_INDEX_RANGE_NO_DATA);
    }
    if s.is_empty() {
        return Ok((0, length));
    }

    let (lo, hi) = match s.split_once(':') {
        Some((lo_text, hi_text)) => {
            let lo: i64 = lo_text.parse().map_err(|_| StatusCode::BAD_INDEX_RANGE_INVALID)?;
            let hi: i64 = hi_text.parse().map_err(|_| StatusCode::BAD_INDEX_RANGE_INVALID)?;
            if hi < 0 || lo >= hi {
                return Err(StatusCode::BAD_INDEX_RANGE_INVALID);
            }
            (lo, hi)
        }
        None => {
            let lo: i64 = s.parse().map_err(|_| StatusCode::BAD_INDEX_RANGE_INVALID)?;
            (lo, -1)
        }
    };
    if lo < 0 {
        return Err(StatusCode::BAD_INDEX_RANGE_INVALID);
    }
    if lo as usize >= length {
        return Err(StatusCode::BAD_INDEX_RANGE_NO_DATA);
    }
    let mut hi = hi;
    if hi >= length as i64 {
        hi = length as i64 - 1;
    }
    if hi == -1 {
        hi = lo;
    }
    Ok((lo as usize, hi as usize + 1))
}

fn range_error(source: &DataValue, status: StatusCode) -> DataValue {
    DataValue {
        value: Variant::null(),
        status,
        source_timestamp: source.source_timestamp,
        source_picoseconds: 0,
        server_timestamp: source.server_timestamp,
        server_picoseconds: 0,
    }
}

fn range_ok(source: &DataValue, value: Variant) -> DataValue {
    DataValue {
        value,
        status: source.status,
        source_timestamp: source.source_timestamp,
        source_picoseconds: 0,
        server_timestamp: source.server_timestamp,
        server_picoseconds: 0,
    }
}

/// Slices `source` by a comma-separated index range. Strings and byte
/// strings admit one dimension; arrays of strings and byte strings admit a
/// second, applied within each element. Slicing is end-exclusive.
pub fn read_range(source: DataValue, index_range: &str) -> DataValue {
    if index_range.is_empty() {
        return source;
    }
    let ranges: Vec<&str> = index_range.split(',').collect();

    match &source.value {
        Variant::Scalar(Scalar::String(text)) => {
            if ranges.len() > 1 {
                return range_error(&source, StatusCode::BAD_INDEX_RANGE_NO_DATA);
            }
            let chars: Vec<char> = text.chars().collect();
            match parse_bounds(ranges[0], chars.len()) {
                Err(status) => range_error(&source, status),
                Ok((lo, hi)) => {
                    let sliced: String = chars[lo..hi].iter().collect();
                    range_ok(&source, Variant::from(sliced))
                }
            }
        }
        Variant::Scalar(Scalar::ByteString(bytes)) => {
            if ranges.len() > 1 {
                return range_error(&source, StatusCode::BAD_INDEX_RANGE_NO_DATA);
            }
            match parse_bounds(ranges[0], bytes.len()) {
                Err(status) => range_error(&source, status),
                Ok((lo, hi)) => range_ok(
                    &source,
                    Variant::from(lattice_ua::ByteString::from(&bytes.as_bytes()[lo..hi])),
                ),
            }
        }
        Variant::Array(array) => {
            let inner_sliceable = matches!(
                array.element_type,
                VariantType::String | VariantType::ByteString
            );
            let max_dims = if inner_sliceable { 2 } else { 1 };
            if ranges.len() > max_dims {
                return range_error(&source, StatusCode::BAD_INDEX_RANGE_NO_DATA);
            }
            let (lo, hi) = match parse_bounds(ranges[0], array.elements.len()) {
                Err(status) => return range_error(&source, status),
                Ok(bounds) => bounds,
            };
            let mut sliced: Vec<Scalar> = array.elements[lo..hi].to_vec();
            if ranges.len() > 1 {
                for element in &mut sliced {
                    match element {
                        Scalar::String(text) => {
                            let chars: Vec<char> = text.chars().collect();
                            match parse_bounds(ranges[1], chars.len()) {
                                Err(status) => return range_error(&source, status),
                                Ok((lo, hi)) => *text = chars[lo..hi].iter().collect(),
                            }
                        }
                        Scalar::ByteString(bytes) => {
                            match parse_bounds(ranges[1], bytes.len()) {
                                Err(status) => return range_error(&source, status),
                                Ok((lo, hi)) => {
                                    *bytes =
                                        lattice_ua::ByteString::from(&bytes.as_bytes()[lo..hi])
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            range_ok(&source, Variant::array(array.element_type, sliced))
        }
        _ => range_error(&source, StatusCode::BAD_INDEX_RANGE_NO_DATA),
    }
}

/// Splices `value` into `source` at the given index range, requiring the
/// incoming slice to exactly fill `(hi - lo)`. An empty range replaces the
/// whole value.
pub fn write_range(
    source: DataValue,
    value: DataValue,
    index_range: &str,
) -> Result<DataValue, StatusCode> {
    if index_range.is_empty() {
        let now = Some(Utc::now());
        return Ok(DataValue {
            value: value.value,
            status: value.status,
            source_timestamp: now,
            source_picoseconds: 0,
            server_timestamp: now,
            server_picoseconds: 0,
        });
    }
    let ranges: Vec<&str> = index_range.split(',').collect();
    let now = Some(Utc::now());

    let spliced: Variant = match (&source.value, &value.value) {
        (Variant::Scalar(Scalar::String(current)), Variant::Scalar(Scalar::String(incoming))) => {
            if ranges.len() > 1 {
                return Err(StatusCode::BAD_INDEX_RANGE_NO_DATA);
            }
            let mut chars: Vec<char> = current.chars().collect();
            let (lo, hi) = parse_bounds(ranges[0], chars.len())?;
            let incoming_chars: Vec<char> = incoming.chars().collect();
            if hi - lo != incoming_chars.len() {
                return Err(StatusCode::BAD_INDEX_RANGE_NO_DATA);
            }
            chars.splice(lo..hi, incoming_chars);
            Variant::from(chars.into_iter().collect::<String>())
        }
        (
            Variant::Scalar(Scalar::ByteString(current)),
            Variant::Scalar(Scalar::ByteString(incoming)),
        ) => {
            if ranges.len() > 1 {
                return Err(StatusCode::BAD_INDEX_RANGE_NO_DATA);
            }
            let mut bytes = current.as_bytes().to_vec();
            let (lo, hi) = parse_bounds(ranges[0], bytes.len())?;
            if hi - lo != incoming.len() {
                return Err(StatusCode::BAD_INDEX_RANGE_NO_DATA);
            }
            bytes.splice(lo..hi, incoming.as_bytes().iter().copied());
            Variant::from(lattice_ua::ByteString::from(bytes))
        }
        (Variant::Array(current), Variant::Array(incoming)) => {
            let inner_sliceable = matches!(
                current.element_type,
                VariantType::String | VariantType::ByteString
            );
            let max_dims = if inner_sliceable { 2 } else { 1 };
            if ranges.len() > max_dims {
                return Err(StatusCode::BAD_INDEX_RANGE_NO_DATA);
            }
            if incoming.element_type != current.element_type {
                return Err(StatusCode::BAD_TYPE_MISMATCH);
            }
            let mut elements = current.elements.clone();
            let (lo, hi) = parse_bounds(ranges[0], elements.len())?;
            if hi - lo != incoming.elements.len() {
                return Err(StatusCode::BAD_INDEX_RANGE_NO_DATA);
            }
            elements.splice(lo..hi, incoming.elements.iter().cloned());
            Variant::array(current.element_type, elements)
        }
        _ => return Err(StatusCode::BAD_INDEX_RANGE_NO_DATA),
    };

    Ok(DataValue {
        value: spliced,
        status: value.status,
        source_timestamp: now,
        source_picoseconds: 0,
        server_timestamp: now,
        server_picoseconds: 0,
    })
}

/// Zeroes the timestamps the client did not ask for.
pub fn select_timestamps(mut values: Vec<DataValue>, policy: TimestampsToReturn) -> Vec<DataValue> {
    match policy {
        TimestampsToReturn::Source => {
            for value in &mut values {
                value.server_timestamp = None;
                value.server_picoseconds = 0;
            }
        }
        TimestampsToReturn::Server => {
            for value in &mut values {
                value.source_timestamp = None;
                value.source_picoseconds = 0;
            }
        }
        TimestampsToReturn::Neither => {
            for value in &mut values {
                value.source_timestamp = None;
                value.source_picoseconds = 0;
                value.server_timestamp = None;
                value.server_picoseconds = 0;
            }
        }
        TimestampsToReturn::Both => {}
    }
    values
}

/// Checks an index range's shape against the destination's data type and
/// rank without evaluating it: the number of dimensions must fit the rank,
/// with one extra dimension admitted for string-like element types.
pub fn validate_index_range(
    ctx: &ServerContext,
    index_range: &str,
    data_type: &lattice_ua::NodeId,
    rank: ValueRank,
) -> StatusCode {
    if index_range.is_empty() {
        return StatusCode::GOOD;
    }
    let ranges: Vec<&str> = index_range.split(',').collect();
    for dimension in &ranges {
        let parsed = match dimension.split_once(':') {
            Some((lo_text, hi_text)) => {
                match (lo_text.parse::<i64>(), hi_text.parse::<i64>()) {
                    (Ok(lo), Ok(hi)) => {
                        if hi < 0 || lo >= hi {
                            return StatusCode::BAD_INDEX_RANGE_INVALID;
                        }
                        lo
                    }
                    _ => return StatusCode::BAD_INDEX_RANGE_INVALID,
                }
            }
            None => match dimension.parse::<i64>() {
                Ok(lo) => lo,
                Err(_) => return StatusCode::BAD_INDEX_RANGE_INVALID,
            },
        };
        if parsed < 0 {
            return StatusCode::BAD_INDEX_RANGE_INVALID;
        }
    }

    let dest_type = ctx.namespace.find_variant_type(data_type);
    let string_like =
        matches!(dest_type, VariantType::String | VariantType::ByteString);
    let dims = ranges.len();
    match rank {
        ValueRank::Any | ValueRank::OneOrMoreDimensions => StatusCode::GOOD,
        ValueRank::Scalar => {
            if dims == 1 && string_like {
                StatusCode::GOOD
            } else {
                StatusCode::BAD_INDEX_RANGE_NO_DATA
            }
        }
        ValueRank::ScalarOrOneDimension | ValueRank::OneDimension => {
            if dims == 1 || (dims == 2 && string_like) {
                StatusCode::GOOD
            } else {
                StatusCode::BAD_INDEX_RANGE_NO_DATA
            }
        }
    }
}

// =============================================================================
// readValue
// =============================================================================

/// Reads one attribute, producing the per-item DataValue.
pub fn read_value(
    ctx: &ServerContext,
    session: &Arc<Session>,
    read_id: &ReadValueId,
) -> DataValue {
    if !read_id.data_encoding.is_empty() {
        return DataValue::bad(StatusCode::BAD_DATA_ENCODING_INVALID);
    }
    if !read_id.index_range.is_empty() && read_id.attribute_id != attribute_id::VALUE {
        return DataValue::bad(StatusCode::BAD_INDEX_RANGE_NO_DATA);
    }
    let node = match ctx.namespace.find_node(&read_id.node_id) {
        Some(node) => node,
        None => return DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN),
    };
    if !user_permitted(ctx, session, &node, permission::BROWSE) {
        return DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN);
    }
    let roles = session.user_roles();
    let defaults = ctx.role_permissions();

    let good = |value: Variant| DataValue::new(value, StatusCode::GOOD, None, Some(Utc::now()));
    let invalid = || DataValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID);

    match read_id.attribute_id {
        attribute_id::VALUE => match &node {
            Node::Variable(variable) => {
                if variable.access_level() & access_level::CURRENT_READ == 0 {
                    return DataValue::bad(StatusCode::BAD_NOT_READABLE);
                }
                if variable.user_access_level(&roles, defaults) & access_level::CURRENT_READ == 0 {
                    return DataValue::bad(StatusCode::BAD_USER_ACCESS_DENIED);
                }
                if let Some(handler) = variable.read_handler() {
                    return handler(read_id);
                }
                read_range(variable.value(), &read_id.index_range)
            }
            _ => invalid(),
        },
        attribute_id::NODE_ID => good(Variant::from(node.node_id())),
        attribute_id::NODE_CLASS => good(Variant::from(node.node_class().mask() as i32)),
        attribute_id::BROWSE_NAME => good(Variant::from(node.browse_name())),
        attribute_id::DISPLAY_NAME => {
            good(Variant::Scalar(Scalar::LocalizedText(node.display_name())))
        }
        attribute_id::DESCRIPTION => {
            good(Variant::Scalar(Scalar::LocalizedText(node.base().description())))
        }
        attribute_id::IS_ABSTRACT => match &node {
            Node::DataType(n) => good(Variant::from(n.is_abstract)),
            Node::ObjectType(n) => good(Variant::from(n.is_abstract)),
            Node::ReferenceType(n) => good(Variant::from(n.is_abstract)),
            Node::VariableType(n) => good(Variant::from(n.is_abstract)),
            _ => invalid(),
        },
        attribute_id::SYMMETRIC => match &node {
            Node::ReferenceType(n) => good(Variant::from(n.symmetric)),
            _ => invalid(),
        },
        attribute_id::INVERSE_NAME => match &node {
            Node::ReferenceType(n) => {
                good(Variant::Scalar(Scalar::LocalizedText(n.inverse_name.clone())))
            }
            _ => invalid(),
        },
        attribute_id::CONTAINS_NO_LOOPS => match &node {
            Node::View(n) => good(Variant::from(n.contains_no_loops)),
            _ => invalid(),
        },
        attribute_id::EVENT_NOTIFIER => match &node {
            Node::Object(n) => good(Variant::from(n.event_notifier())),
            Node::View(n) => good(Variant::from(n.event_notifier)),
            _ => invalid(),
        },
        attribute_id::DATA_TYPE => match &node {
            Node::Variable(n) => good(Variant::from(n.data_type())),
            Node::VariableType(n) => good(Variant::from(n.data_type.clone())),
            _ => invalid(),
        },
        attribute_id::VALUE_RANK => match &node {
            Node::Variable(n) => good(Variant::from(n.value_rank() as i32)),
            Node::VariableType(n) => good(Variant::from(n.value_rank as i32)),
            _ => invalid(),
        },
        attribute_id::ARRAY_DIMENSIONS => match &node {
            Node::Variable(n) => good(Variant::array(
                VariantType::UInt32,
                n.array_dimensions().iter().map(|d| Scalar::UInt32(*d)).collect(),
            )),
            Node::VariableType(n) => good(Variant::array(
                VariantType::UInt32,
                n.array_dimensions.iter().map(|d| Scalar::UInt32(*d)).collect(),
            )),
            _ => invalid(),
        },
        attribute_id::ACCESS_LEVEL => match &node {
            Node::Variable(n) => good(Variant::from(n.access_level())),
            _ => invalid(),
        },
        attribute_id::USER_ACCESS_LEVEL => match &node {
            Node::Variable(n) => good(Variant::from(n.user_access_level(&roles, defaults))),
            _ => invalid(),
        },
        attribute_id::MINIMUM_SAMPLING_INTERVAL => match &node {
            Node::Variable(n) => good(Variant::from(n.minimum_sampling_interval())),
            _ => invalid(),
        },
        attribute_id::HISTORIZING => match &node {
            Node::Variable(n) => good(Variant::from(n.historizing())),
            _ => invalid(),
        },
        attribute_id::EXECUTABLE => match &node {
            Node::Method(n) => good(Variant::from(n.executable())),
            _ => invalid(),
        },
        attribute_id::USER_EXECUTABLE => match &node {
            Node::Method(n) => good(Variant::from(n.user_executable(&roles, defaults))),
            _ => invalid(),
        },
        attribute_id::DATA_TYPE_DEFINITION => match &node {
            Node::DataType(n) => match &n.data_type_definition {
                Some(definition) => good(Variant::Scalar(Scalar::ExtensionObject(Box::new(
                    definition.clone(),
                )))),
                None => invalid(),
            },
            _ => invalid(),
        },
        attribute_id::ROLE_PERMISSIONS => {
            if !user_permitted(ctx, session, &node, permission::READ_ROLE_PERMISSIONS) {
                return invalid();
            }
            let permissions = node.base().role_permissions().unwrap_or_default();
            good(role_permissions_variant(&permissions))
        }
        attribute_id::USER_ROLE_PERMISSIONS => {
            let permissions = node.user_role_permissions(&roles, defaults);
            good(role_permissions_variant(&permissions))
        }
        _ => invalid(),
    }
}

fn role_permissions_variant(permissions: &[lattice_ua::RolePermission]) -> Variant {
    let elements = permissions
        .iter()
        .map(|rp| {
            Scalar::ExtensionObject(Box::new(ExtensionObject {
                type_id: Default::default(),
                body: serde_json::to_value(rp).unwrap_or(serde_json::Value::Null),
            }))
        })
        .collect();
    Variant::Array(ArrayValue {
        element_type: VariantType::ExtensionObject,
        elements,
        dimensions: None,
    })
}

// =============================================================================
// writeValue
// =============================================================================

/// Writes one attribute, producing the per-item status.
pub fn write_value(ctx: &ServerContext, session: &Arc<Session>, write: &WriteValue) -> StatusCode {
    let node = match ctx.namespace.find_node(&write.node_id) {
        Some(node) => node,
        None => return StatusCode::BAD_NODE_ID_UNKNOWN,
    };
    if !user_permitted(ctx, session, &node, permission::BROWSE) {
        return StatusCode::BAD_NODE_ID_UNKNOWN;
    }
    let roles = session.user_roles();
    let defaults = ctx.role_permissions();

    match write.attribute_id {
        attribute_id::VALUE => {
            let variable = match &node {
                Node::Variable(variable) => variable,
                _ => return StatusCode::BAD_ATTRIBUTE_ID_INVALID,
            };
            if variable.access_level() & access_level::CURRENT_WRITE == 0 {
                return StatusCode::BAD_NOT_WRITABLE;
            }
            if variable.user_access_level(&roles, defaults) & access_level::CURRENT_WRITE == 0 {
                return StatusCode::BAD_USER_ACCESS_DENIED;
            }

            let dest_type = ctx.namespace.find_variant_type(&variable.data_type());
            let dest_rank = variable.value_rank();

            let mut incoming = write.value.clone();
            coerce_byte_forms(&mut incoming.value, dest_type, dest_rank);
            if let Some(status) = check_value_admissible(ctx, &incoming.value, dest_type, dest_rank)
            {
                return status;
            }

            if let Some(handler) = variable.write_handler() {
                let mut adjusted = write.clone();
                adjusted.value = incoming;
                let (result, status) = handler(&adjusted);
                if status.is_good() {
                    variable.set_value(result.clone());
                    historize(ctx, variable, &result);
                }
                return status;
            }

            match write_range(variable.value(), incoming, &write.index_range) {
                Ok(result) => {
                    variable.set_value(result.clone());
                    historize(ctx, variable, &result);
                    StatusCode::GOOD
                }
                Err(status) => status,
            }
        }
        attribute_id::HISTORIZING => {
            let variable = match &node {
                Node::Variable(variable) => variable,
                _ => return StatusCode::BAD_ATTRIBUTE_ID_INVALID,
            };
            if !user_permitted(ctx, session, &node, permission::WRITE_HISTORIZING) {
                return StatusCode::BAD_USER_ACCESS_DENIED;
            }
            match &write.value.value {
                Variant::Scalar(Scalar::Boolean(historizing)) => {
                    variable.set_historizing(*historizing);
                    StatusCode::GOOD
                }
                _ => StatusCode::BAD_TYPE_MISMATCH,
            }
        }
        _ => StatusCode::BAD_ATTRIBUTE_ID_INVALID,
    }
}

/// The two special coercions: a scalar ByteString written into a Byte array
/// becomes the array, and a Byte array written into a scalar ByteString
/// becomes the byte string.
fn coerce_byte_forms(value: &mut Variant, dest_type: VariantType, dest_rank: ValueRank) {
    if dest_type == VariantType::Byte && dest_rank == ValueRank::OneDimension {
        if let Variant::Scalar(Scalar::ByteString(bytes)) = value {
            let elements = bytes.as_bytes().iter().map(|b| Scalar::Byte(*b)).collect();
            *value = Variant::array(VariantType::Byte, elements);
        }
    }
    if dest_type == VariantType::ByteString && dest_rank == ValueRank::Scalar {
        if let Variant::Array(array) = value {
            if array.element_type == VariantType::Byte {
                let bytes: Vec<u8> = array
                    .elements
                    .iter()
                    .filter_map(|s| match s {
                        Scalar::Byte(b) => Some(*b),
                        _ => None,
                    })
                    .collect();
                *value = Variant::from(lattice_ua::ByteString::from(bytes));
            }
        }
    }
}

/// Type, rank and length admission for a written value. `None` means the
/// value is admissible.
fn check_value_admissible(
    ctx: &ServerContext,
    value: &Variant,
    dest_type: VariantType,
    dest_rank: ValueRank,
) -> Option<StatusCode> {
    let caps = &ctx.config.capabilities;
    match value {
        Variant::Scalar(Scalar::Null) => None,
        Variant::Scalar(scalar) => {
            if let Scalar::String(text) = scalar {
                if text.len() > caps.max_string_length {
                    return Some(StatusCode::BAD_OUT_OF_RANGE);
                }
            }
            if let Scalar::ByteString(bytes) = scalar {
                if bytes.len() > caps.max_byte_string_length {
                    return Some(StatusCode::BAD_OUT_OF_RANGE);
                }
            }
            let vt = scalar.variant_type();
            if vt != dest_type && dest_type != VariantType::Variant {
                return Some(StatusCode::BAD_TYPE_MISMATCH);
            }
            if !dest_rank.accepts_scalar() {
                return Some(StatusCode::BAD_TYPE_MISMATCH);
            }
            None
        }
        Variant::Array(array) => {
            if array.elements.len() > caps.max_array_length {
                return Some(StatusCode::BAD_OUT_OF_RANGE);
            }
            let admissible = if array.element_type == VariantType::Variant {
                dest_type == VariantType::Variant
            } else {
                array.element_type == dest_type || dest_type == VariantType::Variant
            };
            if !admissible {
                return Some(StatusCode::BAD_TYPE_MISMATCH);
            }
            if !dest_rank.accepts_array() {
                return Some(StatusCode::BAD_TYPE_MISMATCH);
            }
            None
        }
    }
}

fn historize(ctx: &ServerContext, variable: &Arc<lattice_project::VariableNode>, value: &DataValue) {
    if !variable.historizing() {
        return;
    }
    if let Some(historian) = &ctx.historian {
        let historian = historian.clone();
        let node_id = variable.base.node_id();
        let value = value.clone();
        tokio::spawn(async move {
            historian.write_value(&node_id, &value).await;
        });
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// The Read service.
pub async fn handle_read(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: ReadRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::Read,
    ) {
        Some(session) => session,
        None => return,
    };

    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::Read);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    if request.max_age < 0.0 {
        return fail(StatusCode::BAD_MAX_AGE_INVALID);
    }
    let timestamps = match TimestampsToReturn::from_u32(request.timestamps_to_return) {
        Some(policy) => policy,
        None => return fail(StatusCode::BAD_TIMESTAMPS_TO_RETURN_INVALID),
    };
    let count = request.nodes_to_read.len();
    if count == 0 {
        return fail(StatusCode::BAD_NOTHING_TO_DO);
    }
    if count > ctx.config.capabilities.operation_limits.max_nodes_per_read {
        return fail(StatusCode::BAD_TOO_MANY_OPERATIONS);
    }

    let mut tasks = JoinSet::new();
    for (index, read_id) in request.nodes_to_read.into_iter().enumerate() {
        let ctx = ctx.clone();
        let session = session.clone();
        tasks.spawn(async move { (index, read_value(&ctx, &session, &read_id)) });
    }
    let mut results = vec![DataValue::default(); count];
    while let Some(joined) = tasks.join_next().await {
        if let Ok((index, value)) = joined {
            results[index] = value;
        }
    }

    channel.write(
        ServiceResponse::Read(ReadResponse {
            response_header: ResponseHeader::good(handle),
            results: select_timestamps(results, timestamps),
        }),
        request_id,
    );
}

/// The Write service.
pub async fn handle_write(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: WriteRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::Write,
    ) {
        Some(session) => session,
        None => return,
    };

    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::Write);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    let count = request.nodes_to_write.len();
    if count == 0 {
        return fail(StatusCode::BAD_NOTHING_TO_DO);
    }
    if count > ctx.config.capabilities.operation_limits.max_nodes_per_write {
        return fail(StatusCode::BAD_TOO_MANY_OPERATIONS);
    }

    let mut tasks = JoinSet::new();
    for (index, write) in request.nodes_to_write.into_iter().enumerate() {
        let ctx = ctx.clone();
        let session = session.clone();
        tasks.spawn(async move { (index, write_value(&ctx, &session, &write)) });
    }
    let mut results = vec![StatusCode::GOOD; count];
    while let Some(joined) = tasks.join_next().await {
        if let Ok((index, status)) = joined {
            results[index] = status;
        }
    }

    channel.write(
        ServiceResponse::Write(WriteResponse {
            response_header: ResponseHeader::good(handle),
            results,
        }),
        request_id,
    );
}

/// The HistoryRead service: validated here, answered by the historian.
pub async fn handle_history_read(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: HistoryReadRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::HistoryRead,
    ) {
        Some(session) => session,
        None => return,
    };

    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::HistoryRead);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    let timestamps = match TimestampsToReturn::from_u32(request.timestamps_to_return) {
        Some(policy) if policy != TimestampsToReturn::Neither => policy,
        _ => return fail(StatusCode::BAD_INVALID_TIMESTAMP_ARGUMENT),
    };
    let count = request.nodes_to_read.len();
    if count == 0 {
        return fail(StatusCode::BAD_NOTHING_TO_DO);
    }
    if count > ctx.config.capabilities.operation_limits.max_nodes_per_history_read {
        return fail(StatusCode::BAD_TOO_MANY_OPERATIONS);
    }
    let historian = match &ctx.historian {
        Some(historian) => historian.clone(),
        None => return fail(StatusCode::BAD_HISTORY_OPERATION_UNSUPPORTED),
    };

    use lattice_ua::service::HistoryReadDetails;
    let details = request.history_read_details.clone();
    let (results, status) = match &details {
        HistoryReadDetails::ReadEvent { .. } => {
            historian
                .read_event(
                    &request.nodes_to_read,
                    &details,
                    timestamps,
                    request.release_continuation_points,
                )
                .await
        }
        HistoryReadDetails::ReadRawModified { .. } => {
            historian
                .read_raw_modified(
                    &request.nodes_to_read,
                    &details,
                    timestamps,
                    request.release_continuation_points,
                )
                .await
        }
        HistoryReadDetails::ReadProcessed { .. } => {
            historian
                .read_processed(
                    &request.nodes_to_read,
                    &details,
                    timestamps,
                    request.release_continuation_points,
                )
                .await
        }
        HistoryReadDetails::ReadAtTime { .. } => {
            historian
                .read_at_time(
                    &request.nodes_to_read,
                    &details,
                    timestamps,
                    request.release_continuation_points,
                )
                .await
        }
    };

    channel.write(
        ServiceResponse::HistoryRead(HistoryReadResponse {
            response_header: ResponseHeader::fault(handle, status),
            results,
        }),
        request_id,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bounds_boundary_table() {
        assert_eq!(parse_bounds("5:5", 10), Err(StatusCode::BAD_INDEX_RANGE_INVALID));
        assert_eq!(parse_bounds("5:4", 10), Err(StatusCode::BAD_INDEX_RANGE_INVALID));
        assert_eq!(parse_bounds("10", 10), Err(StatusCode::BAD_INDEX_RANGE_NO_DATA));
        assert_eq!(parse_bounds("", 0), Err(StatusCode::BAD_INDEX_RANGE_NO_DATA));
        assert_eq!(parse_bounds("3:100", 10), Ok((3, 10)));
        assert_eq!(parse_bounds("", 4), Ok((0, 4)));
        assert_eq!(parse_bounds("2", 10), Ok((2, 3)));
        assert_eq!(parse_bounds("-1", 10), Err(StatusCode::BAD_INDEX_RANGE_INVALID));
        assert_eq!(parse_bounds("1:-1", 10), Err(StatusCode::BAD_INDEX_RANGE_INVALID));
        assert_eq!(parse_bounds("x", 10), Err(StatusCode::BAD_INDEX_RANGE_INVALID));
    }

    fn int_array(values: &[i32]) -> DataValue {
        DataValue::now(Variant::array(
            VariantType::Int32,
            values.iter().map(|v| Scalar::Int32(*v)).collect(),
        ))
    }

    #[test]
    fn read_range_slices_arrays_end_exclusive() {
        let source = int_array(&[10, 20, 30, 40, 50]);
        let sliced = read_range(source.clone(), "1:3");
        assert_eq!(
            sliced.value,
            Variant::array(
                VariantType::Int32,
                vec![Scalar::Int32(20), Scalar::Int32(30), Scalar::Int32(40)]
            )
        );

        let single = read_range(source.clone(), "2");
        assert_eq!(single.value, Variant::array(VariantType::Int32, vec![Scalar::Int32(30)]));

        let none = read_range(source, "9");
        assert_eq!(none.status, StatusCode::BAD_INDEX_RANGE_NO_DATA);
    }

    #[test]
    fn read_range_strings_one_dimension_only() {
        let source = DataValue::now(Variant::from("abcdef"));
        let sliced = read_range(source.clone(), "1:3");
        assert_eq!(sliced.value, Variant::from("bcd"));
        let multi = read_range(source, "0:1,1:2");
        assert_eq!(multi.status, StatusCode::BAD_INDEX_RANGE_NO_DATA);
    }

    #[test]
    fn read_range_string_arrays_slice_inner() {
        let source = DataValue::now(Variant::array(
            VariantType::String,
            vec![
                Scalar::String("alpha".to_string()),
                Scalar::String("bravo".to_string()),
                Scalar::String("charlie".to_string()),
            ],
        ));
        let sliced = read_range(source, "0:1,0:2");
        assert_eq!(
            sliced.value,
            Variant::array(
                VariantType::String,
                vec![Scalar::String("alp".to_string()), Scalar::String("bra".to_string())]
            )
        );
    }

    #[test]
    fn write_then_read_range_round_trips() {
        let source = int_array(&[1, 2, 3, 4, 5]);
        let incoming = int_array(&[20, 30]);
        let spliced = write_range(source, incoming.clone(), "1:2").unwrap();
        assert_eq!(
            spliced.value,
            Variant::array(
                VariantType::Int32,
                vec![
                    Scalar::Int32(1),
                    Scalar::Int32(20),
                    Scalar::Int32(30),
                    Scalar::Int32(4),
                    Scalar::Int32(5)
                ]
            )
        );
        let read_back = read_range(spliced, "1:2");
        assert_eq!(read_back.value, incoming.value);
    }

    #[test]
    fn write_range_requires_exact_fill() {
        let source = int_array(&[1, 2, 3, 4, 5]);
        let incoming = int_array(&[20, 30, 40]);
        assert_eq!(
            write_range(source, incoming, "1:2"),
            Err(StatusCode::BAD_INDEX_RANGE_NO_DATA)
        );
    }

    #[test]
    fn write_range_string_splice() {
        let source = DataValue::now(Variant::from("abcdef"));
        let incoming = DataValue::now(Variant::from("XY"));
        let spliced = write_range(source, incoming, "2:3").unwrap();
        assert_eq!(spliced.value, Variant::from("abXYef"));
    }

    #[test]
    fn select_timestamps_neither_clears_both() {
        let values = vec![DataValue::now(Variant::from(1i32)), DataValue::now(Variant::from(2i32))];
        let selected = select_timestamps(values, TimestampsToReturn::Neither);
        assert!(selected
            .iter()
            .all(|v| v.source_timestamp.is_none() && v.server_timestamp.is_none()));

        let values = vec![DataValue::now(Variant::from(1i32))];
        let selected = select_timestamps(values, TimestampsToReturn::Source);
        assert!(selected[0].source_timestamp.is_some());
        assert!(selected[0].server_timestamp.is_none());
    }

    #[test]
    fn composed_ranges_agree() {
        // readRange(readRange(v, "1:3"), "1") == readRange(v, "2")
        let source = int_array(&[10, 20, 30, 40, 50]);
        let outer = read_range(source.clone(), "1:3");
        let nested = read_range(outer, "1");
        let direct = read_range(source, "2");
        assert_eq!(nested.value, direct.value);
    }

    #[test]
    fn byte_coercions() {
        let mut v = Variant::from(lattice_ua::ByteString::from(vec![1u8, 2, 3]));
        coerce_byte_forms(&mut v, VariantType::Byte, ValueRank::OneDimension);
        assert_eq!(
            v,
            Variant::array(
                VariantType::Byte,
                vec![Scalar::Byte(1), Scalar::Byte(2), Scalar::Byte(3)]
            )
        );

        let mut v = Variant::array(
            VariantType::Byte,
            vec![Scalar::Byte(9), Scalar::Byte(8), Scalar::Byte(7)],
        );
        coerce_byte_forms(&mut v, VariantType::ByteString, ValueRank::Scalar);
        assert_eq!(v, Variant::from(lattice_ua::ByteString::from(vec![9u8, 8, 7])));
    }
}
