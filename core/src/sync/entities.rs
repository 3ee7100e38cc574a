use crate::{
    error::LigaResult,
    mapping::{FieldMap, CLUB_FIELDS, MATCH_FIELDS, PLAYER_FIELDS, POST_FIELDS, TOURNAMENT_FIELDS},
    model::{Club, Match, Player, Post, Tournament},
    store::Collection,
    types::EntityId,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// An entity a sync service can manage.
pub trait SyncEntity: Serialize + DeserializeOwned + Clone + Send + Sync {
    const COLLECTION: Collection;
    /// Remote table, or `None` for local-only collections.
    const REMOTE_TABLE: Option<&'static str>;
    const FIELDS: FieldMap;
    /// Remote columns that are always written as `null`.
    const CLEARED_COLUMNS: &'static [&'static str] = &[];

    fn id(&self) -> &str;
    fn set_id(&mut self, id: EntityId);

    /// This entity as a remote row.
    fn to_remote_row(&self) -> LigaResult<Value> {
        let mut row = Self::FIELDS.to_remote(serde_json::to_value(self)?);
        if let Value::Object(columns) = &mut row {
            for column in Self::CLEARED_COLUMNS {
                columns.insert((*column).to_string(), Value::Null);
            }
        }
        Ok(row)
    }
}

macro_rules! sync_entity {
    ($ty:ty, $collection:expr, $table:expr, $fields:expr) => {
        sync_entity!($ty, $collection, $table, $fields, &[]);
    };
    ($ty:ty, $collection:expr, $table:expr, $fields:expr, $cleared:expr) => {
        impl SyncEntity for $ty {
            const COLLECTION: Collection = $collection;
            const REMOTE_TABLE: Option<&'static str> = $table;
            const FIELDS: FieldMap = $fields;
            const CLEARED_COLUMNS: &'static [&'static str] = $cleared;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: EntityId) {
                self.id = id;
            }
        }
    };
}

sync_entity!(Player, Collection::Players, Some("players"), PLAYER_FIELDS);
sync_entity!(Club, Collection::Clubs, Some("clubs"), CLUB_FIELDS);
// Embedded matches from older clients live in the matches table once migrated.
sync_entity!(
    Tournament,
    Collection::Tournaments,
    Some("tournaments"),
    TOURNAMENT_FIELDS,
    &["matches"]
);
sync_entity!(Match, Collection::Matches, Some("matches"), MATCH_FIELDS);
sync_entity!(Post, Collection::Posts, None, POST_FIELDS);
