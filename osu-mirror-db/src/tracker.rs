// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! Beatmapset dedup and "already downloaded" bookkeeping.
//!
//! Whatever describes a beatmapset (a full catalog entry, a marker, a raw
//! JSON object or a bare id) is resolved to one beatmapset id, and from
//! there to one row in `downloaded_beatmapsets`.

use tracing::debug;

use crate::catalog::{BEATMAPS, BEATMAPSET_ID, Beatmap, DOWNLOADED_BEATMAPSETS, DownloadedMarker};
use crate::connection::Store;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::schema::ConflictPolicy;
use crate::write::BatchSummary;

/// Raw-object keys accepted as the beatmapset id, in lookup order.
const GROUP_ID_KEYS: &[&str] = &[BEATMAPSET_ID, "group_id"];

/// Anything that identifies a beatmapset.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupDescriptor {
    /// A full catalog entry
    Beatmap(Beatmap),
    /// A marker, used as is
    Marker(DownloadedMarker),
    /// A raw object carrying `beatmapset_id` (or `group_id`)
    Mapping(serde_json::Map<String, serde_json::Value>),
    /// A bare id
    Id(i64),
    /// A bare id that still has to be read as an integer
    Raw(String),
}

impl GroupDescriptor {
    /// Resolve to the marker that records this beatmapset as downloaded.
    pub fn to_marker(&self) -> Result<DownloadedMarker> {
        match self {
            GroupDescriptor::Marker(marker) => Ok(*marker),
            other => other.group_id().map(DownloadedMarker::downloaded),
        }
    }

    /// Resolve to the beatmapset id.
    pub fn group_id(&self) -> Result<i64> {
        match self {
            GroupDescriptor::Beatmap(beatmap) => {
                beatmap.beatmapset_id().ok_or(Error::MissingGroupId)
            }
            GroupDescriptor::Marker(marker) => Ok(marker.beatmapset_id),
            GroupDescriptor::Mapping(object) => {
                let value = GROUP_ID_KEYS
                    .iter()
                    .find_map(|key| object.get(*key))
                    .ok_or(Error::MissingGroupId)?;
                json_group_id(value)
            }
            GroupDescriptor::Id(id) => Ok(*id),
            GroupDescriptor::Raw(raw) => parse_group_id(raw),
        }
    }
}

fn json_group_id(value: &serde_json::Value) -> Result<i64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| Error::InvalidGroupId(n.to_string())),
        serde_json::Value::String(s) => parse_group_id(s),
        other => Err(Error::InvalidGroupId(other.to_string())),
    }
}

fn parse_group_id(raw: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidGroupId(raw.to_owned()))
}

impl From<Beatmap> for GroupDescriptor {
    fn from(beatmap: Beatmap) -> Self {
        GroupDescriptor::Beatmap(beatmap)
    }
}

impl From<&Beatmap> for GroupDescriptor {
    fn from(beatmap: &Beatmap) -> Self {
        GroupDescriptor::Beatmap(beatmap.clone())
    }
}

impl From<DownloadedMarker> for GroupDescriptor {
    fn from(marker: DownloadedMarker) -> Self {
        GroupDescriptor::Marker(marker)
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for GroupDescriptor {
    fn from(object: serde_json::Map<String, serde_json::Value>) -> Self {
        GroupDescriptor::Mapping(object)
    }
}

impl From<i64> for GroupDescriptor {
    fn from(id: i64) -> Self {
        GroupDescriptor::Id(id)
    }
}

impl From<i32> for GroupDescriptor {
    fn from(id: i32) -> Self {
        GroupDescriptor::Id(i64::from(id))
    }
}

impl From<&str> for GroupDescriptor {
    fn from(raw: &str) -> Self {
        GroupDescriptor::Raw(raw.to_owned())
    }
}

/// Keep one entry per beatmapset: the one with the highest beatmap id.
///
/// Beatmapsets keep the order in which they were first seen. Entries
/// without a beatmapset id are dropped.
pub fn dedup_by_group(beatmaps: impl IntoIterator<Item = Beatmap>) -> Vec<Beatmap> {
    let mut groups: Vec<(i64, Beatmap)> = Vec::new();
    for beatmap in beatmaps {
        let Some(group_id) = beatmap.beatmapset_id() else {
            continue;
        };
        match groups.iter_mut().find(|(id, _)| *id == group_id) {
            Some((_, kept)) => {
                if beatmap.id() > kept.id() {
                    *kept = beatmap;
                }
            }
            None => groups.push((group_id, beatmap)),
        }
    }
    groups.into_iter().map(|(_, beatmap)| beatmap).collect()
}

impl Store {
    pub fn add_beatmap(&self, beatmap: &Beatmap, policy: ConflictPolicy) -> Result<usize> {
        self.insert(beatmap.record(), policy)
    }

    pub fn add_beatmaps(
        &mut self,
        beatmaps: &[Beatmap],
        policy: ConflictPolicy,
    ) -> Result<Vec<BatchSummary>> {
        let records: Vec<Record<'static>> = beatmaps.iter().map(|b| b.record().clone()).collect();
        self.insert_many(&records, policy)
    }

    /// Record a beatmapset as downloaded and return the marker written.
    ///
    /// With [`ConflictPolicy::Ignore`] flagging the same beatmapset again
    /// leaves the existing row untouched.
    pub fn flag_as_downloaded(
        &self,
        descriptor: impl Into<GroupDescriptor>,
        policy: ConflictPolicy,
    ) -> Result<DownloadedMarker> {
        let marker = descriptor.into().to_marker()?;
        self.insert(&marker.to_record(), policy)?;
        debug!("Flagged beatmapset {} as downloaded", marker.beatmapset_id);
        Ok(marker)
    }

    /// Flag every descriptor in one batched write.
    pub fn bulk_flag_as_downloaded<I>(
        &mut self,
        descriptors: I,
        policy: ConflictPolicy,
    ) -> Result<Vec<DownloadedMarker>>
    where
        I: IntoIterator,
        I::Item: Into<GroupDescriptor>,
    {
        let markers = descriptors
            .into_iter()
            .map(|d| d.into().to_marker())
            .collect::<Result<Vec<_>>>()?;
        let records: Vec<Record<'static>> = markers.iter().map(DownloadedMarker::to_record).collect();
        self.insert_many(&records, policy)?;
        Ok(markers)
    }

    /// The marker row for a beatmapset, if one was written.
    pub fn get_downloaded_marker(
        &self,
        descriptor: impl Into<GroupDescriptor>,
    ) -> Result<Option<DownloadedMarker>> {
        let group_id = descriptor.into().group_id()?;
        let criteria = Record::new(&DOWNLOADED_BEATMAPSETS).with(BEATMAPSET_ID, group_id);
        Ok(self
            .select(&criteria)?
            .first()
            .and_then(DownloadedMarker::from_row))
    }

    /// Whether a marker row exists for the beatmapset.
    pub fn is_group_downloaded(&self, descriptor: impl Into<GroupDescriptor>) -> Result<bool> {
        Ok(self.get_downloaded_marker(descriptor)?.is_some())
    }

    /// Every marker with `downloaded` set.
    pub fn get_all_downloaded_beatmapsets(&self) -> Result<Vec<DownloadedMarker>> {
        let criteria = Record::new(&DOWNLOADED_BEATMAPSETS).with("downloaded", true);
        Ok(self
            .select(&criteria)?
            .iter()
            .filter_map(DownloadedMarker::from_row)
            .collect())
    }

    pub fn get_all_beatmaps(&self) -> Result<Vec<Beatmap>> {
        self.get_beatmaps(&Record::new(&BEATMAPS))
    }

    /// Beatmaps matching every value `criteria` carries.
    pub fn get_beatmaps(&self, criteria: &Record<'_>) -> Result<Vec<Beatmap>> {
        Ok(self
            .select(criteria)?
            .into_iter()
            .map(Beatmap::from_row)
            .collect())
    }

    pub fn get_beatmap(&self, beatmap_id: i64) -> Result<Option<Beatmap>> {
        let criteria = Record::new(&BEATMAPS).with("beatmap_id", beatmap_id);
        Ok(self.get_beatmaps(&criteria)?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn beatmap(id: i64, set_id: i64) -> Beatmap {
        let raw = json!({
            "beatmap_id": id,
            "beatmapset_id": set_id,
            "approved": 1,
            "title": "t",
            "version": format!("v{id}"),
        });
        Beatmap::from_json(raw.as_object().unwrap()).unwrap()
    }

    fn object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().unwrap().clone()
    }

    #[rstest]
    #[case::beatmap(GroupDescriptor::from(beatmap(7, 42)))]
    #[case::marker(GroupDescriptor::from(DownloadedMarker::downloaded(42)))]
    #[case::mapping(GroupDescriptor::from(object(json!({"beatmapset_id": 42}))))]
    #[case::group_id_key(GroupDescriptor::from(object(json!({"group_id": "42"}))))]
    #[case::id(GroupDescriptor::from(42))]
    #[case::raw(GroupDescriptor::from(" 42 "))]
    fn test_descriptors_resolve_to_same_marker(#[case] descriptor: GroupDescriptor) {
        assert_eq!(descriptor.to_marker().unwrap(), DownloadedMarker::downloaded(42));
    }

    #[test]
    fn test_marker_is_used_as_is() {
        let marker = DownloadedMarker {
            beatmapset_id: 5,
            downloaded: false,
        };
        assert_eq!(GroupDescriptor::from(marker).to_marker().unwrap(), marker);
    }

    #[rstest]
    #[case::no_key(GroupDescriptor::from(object(json!({"beatmap_id": 1}))))]
    #[case::not_a_number(GroupDescriptor::from("forty-two"))]
    #[case::wrong_json_type(GroupDescriptor::from(object(json!({"beatmapset_id": [1]}))))]
    fn test_unresolvable_descriptors(#[case] descriptor: GroupDescriptor) {
        assert!(matches!(
            descriptor.group_id(),
            Err(Error::MissingGroupId | Error::InvalidGroupId(_))
        ));
    }

    #[test]
    fn test_dedup_keeps_highest_beatmap_per_set() {
        let kept = dedup_by_group(vec![
            beatmap(10, 1),
            beatmap(30, 2),
            beatmap(12, 1),
            beatmap(11, 1),
            beatmap(20, 2),
        ]);
        let ids: Vec<_> = kept.iter().map(|b| (b.beatmapset_id(), b.id())).collect();
        assert_eq!(ids, [(Some(1), Some(12)), (Some(2), Some(30))]);
    }
}
