//! What the engine needs from the surrounding view.

use crate::model::{ItemId, TitleMount};

/// The live collection view and its authoritative model.
///
/// `apply_*`/`restore_*` are effectors: they must tolerate being called for an
/// item that is not currently mounted (typically by doing nothing; the
/// watcher reapplies once the item mounts).
pub trait CollectionHost: Send + Sync {
    /// Complete collection order, including items that are not mounted.
    fn ordered_item_ids(&self) -> Vec<ItemId>;

    /// Original content of `id`, from the authoritative model when there is
    /// one, otherwise from the mounted representation.
    fn original_content(&self, id: &ItemId) -> Option<String>;

    fn apply_item(&self, id: &ItemId, content: &str);

    fn restore_item(&self, id: &ItemId, original: &str);

    fn title_original(&self) -> Option<String>;

    /// Title representations currently mounted.
    fn title_mounts(&self) -> Vec<TitleMount>;

    fn apply_title(&self, mount: TitleMount, text: &str);

    fn restore_title(&self, mount: TitleMount, original: &str);
}

/// A representation that (re)appeared in the live view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MountEvent {
    Item(ItemId),
    Title(TitleMount),
}
