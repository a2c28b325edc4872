// Participant records, store-row normalization, and the immutable snapshot
// the draw engine operates on.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::store::SchemaNaming;

// ---------------------------------------------------------------------------
// ParticipantId
// ---------------------------------------------------------------------------

/// Store-assigned participant identifier. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub i64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// A single person taking part in the draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    /// Display name. Assumed unique within the active set, not enforced.
    pub name: String,
    /// True once this participant has drawn someone.
    pub has_secret_assigned: bool,
    /// Id of the participant this person drew. Authoritative when present.
    pub assigned_target_id: Option<ParticipantId>,
    /// Name of the participant this person drew, as recorded by the store.
    pub assigned_target_name: Option<String>,
}

impl Participant {
    /// An unassigned participant.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Participant {
            id: ParticipantId(id),
            name: name.into(),
            has_secret_assigned: false,
            assigned_target_id: None,
            assigned_target_name: None,
        }
    }

    /// Mark this participant as having drawn `target`.
    pub fn assigned_to(mut self, target: &Participant) -> Self {
        self.has_secret_assigned = true;
        self.assigned_target_id = Some(target.id);
        self.assigned_target_name = Some(target.name.clone());
        self
    }

    /// Mark this participant as having drawn a name only, the way the
    /// historical schema records assignments.
    pub fn assigned_to_name(mut self, target_name: impl Into<String>) -> Self {
        self.has_secret_assigned = true;
        self.assigned_target_id = None;
        self.assigned_target_name = Some(target_name.into());
        self
    }

    /// Build a participant from a raw store row.
    ///
    /// Field lookup follows a fixed precedence: the capitalized column name,
    /// then the lowercase one, then the snake_case legacy aliases. A key
    /// that is present but `null` falls through to the next candidate.
    /// Returns `None` when no usable id is found.
    pub fn from_row(row: &Value) -> Option<Participant> {
        let obj = row.as_object()?;

        let lookup = |keys: Vec<&'static str>| first_present(obj, &keys);

        let id = lookup(column_keys(SchemaNaming::id_column, &[])).and_then(as_i64)?;

        let name = lookup(column_keys(SchemaNaming::name_column, &[]))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let has_secret_assigned = lookup(column_keys(SchemaNaming::flag_column, &["tem_segredo"]))
            .and_then(as_flag)
            .unwrap_or(false);

        let assigned_target_name = lookup(column_keys(SchemaNaming::target_column, &[]))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let assigned_target_id = lookup(column_keys(
            SchemaNaming::target_id_column,
            &["segredo_id"],
        ))
        .and_then(as_i64)
        .map(ParticipantId);

        Some(Participant {
            id: ParticipantId(id),
            name,
            has_secret_assigned,
            assigned_target_id,
            assigned_target_name,
        })
    }
}

/// Candidate keys for one column, in precedence order.
fn column_keys(
    column: fn(SchemaNaming) -> &'static str,
    legacy: &[&'static str],
) -> Vec<&'static str> {
    SchemaNaming::ALL
        .iter()
        .map(|n| column(*n))
        .chain(legacy.iter().copied())
        .collect()
}

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_flag(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Some(true),
            "false" | "f" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// An immutable view of every participant at the moment it was loaded.
///
/// Each draw operation takes the snapshot it works on explicitly; a new one
/// is loaded from the repository after every successful commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    participants: Vec<Participant>,
}

impl Snapshot {
    /// Build a snapshot, resolving name-only assignments to target ids.
    ///
    /// A stored target name that matches exactly one participant gets that
    /// participant's id. Ambiguous or unknown names are left unresolved;
    /// the draw engine then excludes every participant carrying that name.
    pub fn new(mut participants: Vec<Participant>) -> Self {
        let mut by_name: HashMap<&str, Vec<ParticipantId>> = HashMap::new();
        for p in &participants {
            by_name.entry(p.name.as_str()).or_default().push(p.id);
        }

        let resolved: Vec<Option<ParticipantId>> = participants
            .iter()
            .map(|p| {
                if !p.has_secret_assigned || p.assigned_target_id.is_some() {
                    return p.assigned_target_id;
                }
                let name = p.assigned_target_name.as_deref()?;
                match by_name.get(name).map(Vec::as_slice) {
                    Some([only]) => Some(*only),
                    Some(many) => {
                        warn!(
                            participant = %p.id,
                            target = name,
                            matches = many.len(),
                            "assigned target name is ambiguous; excluding every namesake"
                        );
                        None
                    }
                    None => {
                        debug!(participant = %p.id, target = name, "assigned target name not in snapshot");
                        None
                    }
                }
            })
            .collect();

        for (p, target_id) in participants.iter_mut().zip(resolved) {
            p.assigned_target_id = target_id;
        }

        Snapshot { participants }
    }

    pub fn empty() -> Self {
        Snapshot::default()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Participants who have not drawn yet, in store order. These are the
    /// identities offered on the selection screen.
    pub fn unassigned(&self) -> Vec<&Participant> {
        self.participants
            .iter()
            .filter(|p| !p.has_secret_assigned)
            .collect()
    }

    pub fn assigned_count(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| p.has_secret_assigned)
            .count()
    }

    /// True when there is at least one participant and everyone has drawn.
    pub fn is_complete(&self) -> bool {
        !self.participants.is_empty() && self.assigned_count() == self.participants.len()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
