use std::fmt;
use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::catalog::Catalog;
use crate::common::{
    BriarError, PageId, RecordId, Result, SlotId, INVALID_PAGE_ID, MAX_KEY_SIZE,
};
use crate::storage::page::{PageType, SlottedPageRef, PAGE_DATA_SIZE};

use super::entry::entry_len;
use super::header_page::{HeaderPage, HeaderPageRef};
use super::index_page::{IndexPage, IndexPageRef};
use super::leaf_page::{LeafPage, LeafPageRef};
use super::btree_scan::BTreeScan;

/// A node is at least half full while its available space stays at or
/// below this threshold.
const HALF_PAGE: usize = PAGE_DATA_SIZE / 2;

/// Result of a recursive insert: either the entry was absorbed, or a split
/// produced a new right node whose separator must be installed upstream.
enum InsertEffect {
    None,
    Promoted { key: Vec<u8>, page_id: PageId },
}

/// Result of a recursive delete: either the subtree kept its shape, or a
/// merge consumed `orphan` and the parent must drop that child pointer.
enum DeleteEffect {
    None,
    Merged { orphan: PageId, right_sibling: bool },
}

/// Controls how much of the tree `print_tree` walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintOption {
    Single,
    Recursive,
}

/// A disk-resident B+-tree index mapping byte-string keys to record ids.
///
/// The tree owns every page reachable from its header page; frames are
/// borrowed from the buffer pool through guards, so every code path
/// releases what it pinned. The root id lives only in the header page.
pub struct BTreeFile {
    name: String,
    header_pid: PageId,
    bpm: Arc<BufferPoolManager>,
    catalog: Catalog,
}

impl BTreeFile {
    /// Opens the index named `name`, creating it (header page plus catalog
    /// binding) if it does not exist yet.
    pub fn open(name: &str, bpm: Arc<BufferPoolManager>) -> Result<Self> {
        let catalog = Catalog::new(bpm.clone());

        let header_pid = match catalog.get_file_entry(name)? {
            Some(pid) => pid,
            None => {
                let pid = bpm.new_page()?;
                {
                    let mut guard = bpm
                        .checked_write_page(pid)?
                        .ok_or(BriarError::PageNotFound(pid))?;
                    let mut header = HeaderPage::new(guard.data_mut());
                    header.init();
                }
                catalog.add_file_entry(name, pid)?;
                tracing::debug!(file = name, header = pid.as_u32(), "created index file");
                pid
            }
        };

        Ok(Self {
            name: name.to_string(),
            header_pid,
            bpm,
            catalog,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current root page id (`INVALID_PAGE_ID` when empty).
    pub fn root_page_id(&self) -> Result<PageId> {
        let guard = self
            .bpm
            .checked_read_page(self.header_pid)?
            .ok_or(BriarError::PageNotFound(self.header_pid))?;
        Ok(HeaderPageRef::new(guard.data()).root_page_id())
    }

    fn set_root_page_id(&self, page_id: PageId) -> Result<()> {
        let mut guard = self
            .bpm
            .checked_write_page(self.header_pid)?
            .ok_or(BriarError::PageNotFound(self.header_pid))?;
        HeaderPage::new(guard.data_mut()).set_root_page_id(page_id);
        Ok(())
    }

    /// Tears the index down: frees every reachable page bottom-up, frees
    /// the header page, and removes the catalog binding.
    pub fn destroy(self) -> Result<()> {
        let root = self.root_page_id()?;
        if root != INVALID_PAGE_ID {
            self.destroy_node(root)?;
        }

        self.bpm.delete_page(self.header_pid)?;
        self.catalog.delete_file_entry(&self.name)?;
        tracing::debug!(file = %self.name, "destroyed index file");
        Ok(())
    }

    fn destroy_node(&self, page_id: PageId) -> Result<()> {
        let children = {
            let guard = self
                .bpm
                .checked_read_page(page_id)?
                .ok_or(BriarError::PageNotFound(page_id))?;
            let page = SlottedPageRef::new(guard.data());
            match page.page_type()? {
                PageType::Leaf => Vec::new(),
                PageType::Index => index_children(&IndexPageRef::new(guard.data()))?,
            }
        };

        for child in children {
            self.destroy_node(child)?;
        }

        self.bpm.delete_page(page_id)?;
        Ok(())
    }

    /// Inserts an entry. Splits propagate upward as far as needed; a root
    /// split grows the tree by one level.
    pub fn insert(&mut self, key: &[u8], rid: RecordId) -> Result<()> {
        if key.len() > MAX_KEY_SIZE {
            return Err(BriarError::KeyTooLong {
                len: key.len(),
                max: MAX_KEY_SIZE,
            });
        }

        let root = self.root_page_id()?;

        // First insertion: a single leaf serves as the whole tree.
        if root == INVALID_PAGE_ID {
            let leaf_pid = self.bpm.new_page()?;
            {
                let mut guard = self
                    .bpm
                    .checked_write_page(leaf_pid)?
                    .ok_or(BriarError::PageNotFound(leaf_pid))?;
                let mut leaf = LeafPage::new(guard.data_mut());
                leaf.init(leaf_pid);
                leaf.insert(key, rid)?;
            }
            self.set_root_page_id(leaf_pid)?;
            tracing::debug!(root = leaf_pid.as_u32(), "installed root leaf");
            return Ok(());
        }

        match self.page_type_of(root)? {
            PageType::Leaf => {
                let fits = {
                    let guard = self
                        .bpm
                        .checked_read_page(root)?
                        .ok_or(BriarError::PageNotFound(root))?;
                    let leaf = LeafPageRef::new(guard.data());
                    leaf.available_space() >= entry_len(key, PageType::Leaf)
                };

                if fits {
                    let mut guard = self
                        .bpm
                        .checked_write_page(root)?
                        .ok_or(BriarError::PageNotFound(root))?;
                    let mut leaf = LeafPage::new(guard.data_mut());
                    leaf.insert(key, rid)?;
                } else {
                    let new_root = self.split_root_leaf(root, key, rid)?;
                    self.set_root_page_id(new_root)?;
                }
            }
            PageType::Index => {
                if let InsertEffect::Promoted {
                    key: sep,
                    page_id: new_child,
                } = self.insert_into(root, key, rid)?
                {
                    let new_root = self.bpm.new_page()?;
                    {
                        let mut guard = self
                            .bpm
                            .checked_write_page(new_root)?
                            .ok_or(BriarError::PageNotFound(new_root))?;
                        let mut node = IndexPage::new(guard.data_mut());
                        node.init(new_root);
                        node.set_leftmost_child(root);
                        node.insert(&sep, new_child)?;
                    }
                    self.set_root_page_id(new_root)?;
                    tracing::debug!(root = new_root.as_u32(), "root index split");
                }
            }
        }

        Ok(())
    }

    /// Splits the single-leaf root into a new index root over two leaves.
    /// The fresh leaf takes the smaller half and becomes the new root's
    /// leftmost child; the old leaf keeps the larger keys and its first
    /// key becomes the only separator.
    fn split_root_leaf(&mut self, leaf_pid: PageId, key: &[u8], rid: RecordId) -> Result<PageId> {
        let new_root_pid = self.bpm.new_page()?;
        let new_leaf_pid = self.bpm.new_page()?;

        let mut root_guard = self
            .bpm
            .checked_write_page(new_root_pid)?
            .ok_or(BriarError::PageNotFound(new_root_pid))?;
        let mut new_root = IndexPage::new(root_guard.data_mut());
        new_root.init(new_root_pid);

        let mut new_guard = self
            .bpm
            .checked_write_page(new_leaf_pid)?
            .ok_or(BriarError::PageNotFound(new_leaf_pid))?;
        let mut new_leaf = LeafPage::new(new_guard.data_mut());
        new_leaf.init(new_leaf_pid);

        let mut old_guard = self
            .bpm
            .checked_write_page(leaf_pid)?
            .ok_or(BriarError::PageNotFound(leaf_pid))?;
        let mut leaf = LeafPage::new(old_guard.data_mut());

        // Move the leading entries until the halves balance.
        while new_leaf.available_space() > leaf.available_space() {
            match leaf.pop_first()? {
                Some((k, r)) => {
                    new_leaf.insert(&k, r)?;
                }
                None => break,
            }
        }

        let split_key = leaf
            .get_first()
            .map(|(_, k, _)| k.to_vec())
            .ok_or_else(|| BriarError::TreeCorrupted("split left an empty leaf".into()))?;

        // The old leaf holds the upper half now.
        if key >= split_key.as_slice() {
            leaf.insert(key, rid)?;
        } else {
            new_leaf.insert(key, rid)?;
        }

        let separator = leaf
            .get_first()
            .map(|(_, k, _)| k.to_vec())
            .ok_or_else(|| BriarError::TreeCorrupted("split left an empty leaf".into()))?;

        new_root.set_leftmost_child(new_leaf_pid);
        new_root.insert(&separator, leaf_pid)?;

        new_leaf.set_next_page(Some(leaf_pid));
        leaf.set_prev_page(Some(new_leaf_pid));

        tracing::debug!(
            old = leaf_pid.as_u32(),
            new = new_leaf_pid.as_u32(),
            root = new_root_pid.as_u32(),
            "split root leaf"
        );
        Ok(new_root_pid)
    }

    fn insert_into(&mut self, node_pid: PageId, key: &[u8], rid: RecordId) -> Result<InsertEffect> {
        match self.page_type_of(node_pid)? {
            PageType::Leaf => {
                let fits = {
                    let guard = self
                        .bpm
                        .checked_read_page(node_pid)?
                        .ok_or(BriarError::PageNotFound(node_pid))?;
                    let leaf = LeafPageRef::new(guard.data());
                    leaf.available_space() >= entry_len(key, PageType::Leaf)
                };

                if fits {
                    let mut guard = self
                        .bpm
                        .checked_write_page(node_pid)?
                        .ok_or(BriarError::PageNotFound(node_pid))?;
                    let mut leaf = LeafPage::new(guard.data_mut());
                    leaf.insert(key, rid)?;
                    return Ok(InsertEffect::None);
                }

                self.split_leaf(node_pid, key, rid)
            }
            PageType::Index => {
                let (child, _) = {
                    let guard = self
                        .bpm
                        .checked_read_page(node_pid)?
                        .ok_or(BriarError::PageNotFound(node_pid))?;
                    IndexPageRef::new(guard.data()).find_page(key)?
                };

                let (sep, new_child) = match self.insert_into(child, key, rid)? {
                    InsertEffect::None => return Ok(InsertEffect::None),
                    InsertEffect::Promoted { key, page_id } => (key, page_id),
                };

                let fits = {
                    let guard = self
                        .bpm
                        .checked_read_page(node_pid)?
                        .ok_or(BriarError::PageNotFound(node_pid))?;
                    let node = IndexPageRef::new(guard.data());
                    node.available_space() >= entry_len(&sep, PageType::Index)
                };

                if fits {
                    let mut guard = self
                        .bpm
                        .checked_write_page(node_pid)?
                        .ok_or(BriarError::PageNotFound(node_pid))?;
                    let mut node = IndexPage::new(guard.data_mut());
                    node.insert(&sep, new_child)?;
                    return Ok(InsertEffect::None);
                }

                self.split_index(node_pid, &sep, new_child)
            }
        }
    }

    /// Splits a full leaf on the recursive path: the fresh leaf goes to
    /// the right and takes the larger half; its first key is promoted.
    fn split_leaf(&mut self, leaf_pid: PageId, key: &[u8], rid: RecordId) -> Result<InsertEffect> {
        let new_leaf_pid = self.bpm.new_page()?;

        let old_next;
        let promoted;
        {
            let mut old_guard = self
                .bpm
                .checked_write_page(leaf_pid)?
                .ok_or(BriarError::PageNotFound(leaf_pid))?;
            let mut leaf = LeafPage::new(old_guard.data_mut());

            let mut new_guard = self
                .bpm
                .checked_write_page(new_leaf_pid)?
                .ok_or(BriarError::PageNotFound(new_leaf_pid))?;
            let mut new_leaf = LeafPage::new(new_guard.data_mut());
            new_leaf.init(new_leaf_pid);

            // Move the trailing entries until the halves balance.
            while new_leaf.available_space() > leaf.available_space() {
                match leaf.pop_last()? {
                    Some((k, r)) => {
                        new_leaf.insert(&k, r)?;
                    }
                    None => break,
                }
            }

            let split_key = new_leaf
                .get_first()
                .map(|(_, k, _)| k.to_vec())
                .ok_or_else(|| BriarError::TreeCorrupted("split moved no entries".into()))?;

            // The new leaf holds the upper half.
            if key >= split_key.as_slice() {
                new_leaf.insert(key, rid)?;
            } else {
                leaf.insert(key, rid)?;
            }

            promoted = new_leaf
                .get_first()
                .map(|(_, k, _)| k.to_vec())
                .ok_or_else(|| BriarError::TreeCorrupted("split moved no entries".into()))?;

            // Splice the new leaf into the chain.
            old_next = leaf.next_page();
            new_leaf.set_next_page(old_next);
            new_leaf.set_prev_page(Some(leaf_pid));
            leaf.set_next_page(Some(new_leaf_pid));
        }

        if let Some(next_pid) = old_next {
            let mut guard = self
                .bpm
                .checked_write_page(next_pid)?
                .ok_or(BriarError::PageNotFound(next_pid))?;
            LeafPage::new(guard.data_mut()).set_prev_page(Some(new_leaf_pid));
        }

        tracing::debug!(
            old = leaf_pid.as_u32(),
            new = new_leaf_pid.as_u32(),
            "split leaf"
        );
        Ok(InsertEffect::Promoted {
            key: promoted,
            page_id: new_leaf_pid,
        })
    }

    /// Splits a full index node. The first entry of the new right node is
    /// popped: its child becomes the new node's leftmost child and its key
    /// is promoted to the parent.
    fn split_index(
        &mut self,
        node_pid: PageId,
        key: &[u8],
        child: PageId,
    ) -> Result<InsertEffect> {
        let new_index_pid = self.bpm.new_page()?;

        let promoted;
        {
            let mut old_guard = self
                .bpm
                .checked_write_page(node_pid)?
                .ok_or(BriarError::PageNotFound(node_pid))?;
            let mut node = IndexPage::new(old_guard.data_mut());

            let mut new_guard = self
                .bpm
                .checked_write_page(new_index_pid)?
                .ok_or(BriarError::PageNotFound(new_index_pid))?;
            let mut new_node = IndexPage::new(new_guard.data_mut());
            new_node.init(new_index_pid);

            while new_node.available_space() > node.available_space() {
                match node.pop_last()? {
                    Some((k, c)) => {
                        new_node.insert(&k, c)?;
                    }
                    None => break,
                }
            }

            let (sep, sep_child) = new_node
                .pop_first()?
                .ok_or_else(|| BriarError::TreeCorrupted("split moved no entries".into()))?;
            new_node.set_leftmost_child(sep_child);

            if key >= sep.as_slice() {
                new_node.insert(key, child)?;
            } else {
                node.insert(key, child)?;
            }

            promoted = sep;
        }

        tracing::debug!(
            old = node_pid.as_u32(),
            new = new_index_pid.as_u32(),
            "split index node"
        );
        Ok(InsertEffect::Promoted {
            key: promoted,
            page_id: new_index_pid,
        })
    }

    /// Deletes the entry matching `(key, rid)`. Underflowing nodes borrow
    /// from or merge with a sibling; an emptied root collapses.
    pub fn delete(&mut self, key: &[u8], rid: RecordId) -> Result<()> {
        if key.len() > MAX_KEY_SIZE {
            return Err(BriarError::KeyTooLong {
                len: key.len(),
                max: MAX_KEY_SIZE,
            });
        }

        let root = self.root_page_id()?;
        if root == INVALID_PAGE_ID {
            return Err(BriarError::KeyNotFound);
        }

        match self.page_type_of(root)? {
            PageType::Leaf => {
                let now_empty = {
                    let mut guard = self
                        .bpm
                        .checked_write_page(root)?
                        .ok_or(BriarError::PageNotFound(root))?;
                    let mut leaf = LeafPage::new(guard.data_mut());
                    leaf.delete(key, rid)?;
                    leaf.num_records() == 0
                };

                if now_empty {
                    self.set_root_page_id(INVALID_PAGE_ID)?;
                    self.bpm.delete_page(root)?;
                    tracing::debug!("deleted last entry, tree is empty");
                }
                Ok(())
            }
            PageType::Index => {
                let (child, _) = {
                    let guard = self
                        .bpm
                        .checked_read_page(root)?
                        .ok_or(BriarError::PageNotFound(root))?;
                    IndexPageRef::new(guard.data()).find_page(key)?
                };

                if let DeleteEffect::Merged {
                    orphan,
                    right_sibling,
                } = self.delete_from(root, child, key, rid)?
                {
                    let (now_empty, leftmost) = {
                        let mut guard = self
                            .bpm
                            .checked_write_page(root)?
                            .ok_or(BriarError::PageNotFound(root))?;
                        let mut node = IndexPage::new(guard.data_mut());
                        node.delete_page(orphan, right_sibling)?;
                        (node.num_records() == 0, node.leftmost_child()?)
                    };
                    self.bpm.delete_page(orphan)?;

                    if now_empty {
                        self.set_root_page_id(leftmost)?;
                        self.bpm.delete_page(root)?;
                        tracing::debug!(root = leftmost.as_u32(), "collapsed root");
                    }
                }
                Ok(())
            }
        }
    }

    fn delete_from(
        &mut self,
        parent_pid: PageId,
        node_pid: PageId,
        key: &[u8],
        rid: RecordId,
    ) -> Result<DeleteEffect> {
        match self.page_type_of(node_pid)? {
            PageType::Leaf => self.delete_from_leaf(parent_pid, node_pid, key, rid),
            PageType::Index => {
                let (child, _) = {
                    let guard = self
                        .bpm
                        .checked_read_page(node_pid)?
                        .ok_or(BriarError::PageNotFound(node_pid))?;
                    IndexPageRef::new(guard.data()).find_page(key)?
                };

                let (orphan, right_sibling) = match self.delete_from(node_pid, child, key, rid)? {
                    DeleteEffect::None => return Ok(DeleteEffect::None),
                    DeleteEffect::Merged {
                        orphan,
                        right_sibling,
                    } => (orphan, right_sibling),
                };

                let still_half_full = {
                    let mut guard = self
                        .bpm
                        .checked_write_page(node_pid)?
                        .ok_or(BriarError::PageNotFound(node_pid))?;
                    let mut node = IndexPage::new(guard.data_mut());
                    node.delete_page(orphan, right_sibling)?;
                    node.available_space() <= HALF_PAGE
                };
                self.bpm.delete_page(orphan)?;

                if still_half_full {
                    return Ok(DeleteEffect::None);
                }

                self.rebalance_index(parent_pid, node_pid)
            }
        }
    }

    fn delete_from_leaf(
        &mut self,
        parent_pid: PageId,
        node_pid: PageId,
        key: &[u8],
        rid: RecordId,
    ) -> Result<DeleteEffect> {
        {
            let mut guard = self
                .bpm
                .checked_write_page(node_pid)?
                .ok_or(BriarError::PageNotFound(node_pid))?;
            let mut leaf = LeafPage::new(guard.data_mut());
            leaf.delete(key, rid)?;

            if leaf.available_space() <= HALF_PAGE {
                return Ok(DeleteEffect::None);
            }
        }

        self.rebalance_leaf(parent_pid, node_pid)
    }

    /// Repairs an underfull leaf: borrow from the chosen sibling until the
    /// leaf is half full again, or drain the sibling entirely and splice
    /// it out of the chain.
    fn rebalance_leaf(&mut self, parent_pid: PageId, node_pid: PageId) -> Result<DeleteEffect> {
        let (sibling_pid, right_sibling) = {
            let guard = self
                .bpm
                .checked_read_page(parent_pid)?
                .ok_or(BriarError::PageNotFound(parent_pid))?;
            IndexPageRef::new(guard.data()).find_sibling_for_child(node_pid)?
        };

        let effect;
        // (neighbor page, true when it follows the surviving node)
        let mut chain_fix: Option<(PageId, bool)> = None;
        {
            let mut parent_guard = self
                .bpm
                .checked_write_page(parent_pid)?
                .ok_or(BriarError::PageNotFound(parent_pid))?;
            let mut parent = IndexPage::new(parent_guard.data_mut());

            let mut node_guard = self
                .bpm
                .checked_write_page(node_pid)?
                .ok_or(BriarError::PageNotFound(node_pid))?;
            let mut node = LeafPage::new(node_guard.data_mut());

            let mut sibling_guard = self
                .bpm
                .checked_write_page(sibling_pid)?
                .ok_or(BriarError::PageNotFound(sibling_pid))?;
            let mut sibling = LeafPage::new(sibling_guard.data_mut());

            // Separator of the right-hand node, captured before any moves.
            let old_parent_key = if right_sibling {
                parent.find_key_with_page(sibling_pid)?
            } else {
                parent.find_key_with_page(node_pid)?
            };

            while node.available_space() > HALF_PAGE {
                let moved = if right_sibling {
                    sibling.pop_first()?
                } else {
                    sibling.pop_last()?
                };
                match moved {
                    Some((k, r)) => {
                        node.insert(&k, r)?;
                    }
                    None => break,
                }
            }

            if sibling.available_space() <= HALF_PAGE {
                // Redistribution held: the right-hand node has a new first
                // key, so its separator must follow.
                let new_first = if right_sibling {
                    sibling.get_first()
                } else {
                    node.get_first()
                }
                .map(|(_, k, _)| k.to_vec());

                if let (Some(old), Some(new)) = (old_parent_key, new_first) {
                    parent.adjust_key(&new, &old)?;
                }
                tracing::debug!(
                    node = node_pid.as_u32(),
                    sibling = sibling_pid.as_u32(),
                    "redistributed leaf entries"
                );
                effect = DeleteEffect::None;
            } else if sibling.available_space() + node.available_space() >= PAGE_DATA_SIZE {
                // Merge: drain the sibling and splice it out of the chain.
                while let Some((k, r)) = sibling.pop_first()? {
                    node.insert(&k, r)?;
                }

                if right_sibling {
                    let next = sibling.next_page();
                    node.set_next_page(next);
                    if let Some(next_pid) = next {
                        chain_fix = Some((next_pid, true));
                    }
                } else {
                    let prev = sibling.prev_page();
                    node.set_prev_page(prev);
                    if let Some(prev_pid) = prev {
                        chain_fix = Some((prev_pid, false));
                    }
                }
                tracing::debug!(
                    node = node_pid.as_u32(),
                    sibling = sibling_pid.as_u32(),
                    "merged leaves"
                );
                effect = DeleteEffect::Merged {
                    orphan: sibling_pid,
                    right_sibling,
                };
            } else {
                // Transient underflow below the root is tolerated.
                effect = DeleteEffect::None;
            }
        }

        if let Some((neighbor, follows_node)) = chain_fix {
            let mut guard = self
                .bpm
                .checked_write_page(neighbor)?
                .ok_or(BriarError::PageNotFound(neighbor))?;
            let mut page = LeafPage::new(guard.data_mut());
            if follows_node {
                page.set_prev_page(Some(node_pid));
            } else {
                page.set_next_page(Some(node_pid));
            }
        }

        Ok(effect)
    }

    /// Repairs an underfull index node. Moving a separator across sibling
    /// boundaries rotates it through the parent: the parent key comes down
    /// in front of a transferred leftmost child, and the sibling's edge
    /// key goes up to replace it.
    fn rebalance_index(&mut self, parent_pid: PageId, node_pid: PageId) -> Result<DeleteEffect> {
        let (sibling_pid, right_sibling) = {
            let guard = self
                .bpm
                .checked_read_page(parent_pid)?
                .ok_or(BriarError::PageNotFound(parent_pid))?;
            IndexPageRef::new(guard.data()).find_sibling_for_child(node_pid)?
        };

        let mut parent_guard = self
            .bpm
            .checked_write_page(parent_pid)?
            .ok_or(BriarError::PageNotFound(parent_pid))?;
        let mut parent = IndexPage::new(parent_guard.data_mut());

        let mut node_guard = self
            .bpm
            .checked_write_page(node_pid)?
            .ok_or(BriarError::PageNotFound(node_pid))?;
        let mut node = IndexPage::new(node_guard.data_mut());

        let mut sibling_guard = self
            .bpm
            .checked_write_page(sibling_pid)?
            .ok_or(BriarError::PageNotFound(sibling_pid))?;
        let mut sibling = IndexPage::new(sibling_guard.data_mut());

        // The parent separator between the two siblings is the only lower
        // bound available for the child pointer that crosses over.
        let mut boundary_key = if right_sibling {
            parent.find_key_with_page(sibling_pid)?
        } else {
            parent.find_key_with_page(node_pid)?
        }
        .ok_or_else(|| {
            BriarError::TreeCorrupted("no separator between rebalancing siblings".into())
        })?;

        while node.available_space() > HALF_PAGE {
            if right_sibling {
                let (edge_key, edge_child) = match sibling.get_first() {
                    Some((_, k, c)) => (k.to_vec(), c),
                    None => break,
                };
                let moved = sibling.leftmost_child()?;
                node.insert(&boundary_key, moved)?;
                parent.adjust_key(&edge_key, &boundary_key)?;
                sibling.set_leftmost_child(edge_child);
                sibling.delete_at(SlotId::new(0))?;
                boundary_key = edge_key;
            } else {
                let (edge_key, edge_child) = match sibling.get_last() {
                    Some((_, k, c)) => (k.to_vec(), c),
                    None => break,
                };
                let own_leftmost = node.leftmost_child()?;
                node.insert(&boundary_key, own_leftmost)?;
                parent.adjust_key(&edge_key, &boundary_key)?;
                node.set_leftmost_child(edge_child);
                let last = SlotId::new(sibling.num_records() - 1);
                sibling.delete_at(last)?;
                boundary_key = edge_key;
            }
        }

        if sibling.available_space() <= HALF_PAGE {
            tracing::debug!(
                node = node_pid.as_u32(),
                sibling = sibling_pid.as_u32(),
                "redistributed index entries"
            );
            return Ok(DeleteEffect::None);
        }

        // The merge also materialises one leftmost child as a regular
        // entry, so that entry's size joins the fit check.
        let merged_fits = sibling.available_space() + node.available_space()
            >= PAGE_DATA_SIZE + entry_len(&boundary_key, PageType::Index);

        if merged_fits {
            if right_sibling {
                let moved = sibling.leftmost_child()?;
                node.insert(&boundary_key, moved)?;
                while let Some((k, c)) = sibling.pop_first()? {
                    node.insert(&k, c)?;
                }
            } else {
                let own_leftmost = node.leftmost_child()?;
                node.insert(&boundary_key, own_leftmost)?;
                while let Some((k, c)) = sibling.pop_first()? {
                    node.insert(&k, c)?;
                }
                node.set_leftmost_child(sibling.leftmost_child()?);
            }
            tracing::debug!(
                node = node_pid.as_u32(),
                sibling = sibling_pid.as_u32(),
                "merged index nodes"
            );
            return Ok(DeleteEffect::Merged {
                orphan: sibling_pid,
                right_sibling,
            });
        }

        Ok(DeleteEffect::None)
    }

    /// Returns the leaf that would hold `key`, or None on an empty tree.
    pub fn search(&self, key: &[u8]) -> Result<Option<PageId>> {
        self.find_leaf(key, false)
    }

    /// Opens a forward scan over `[low, high]`. Either bound may be
    /// absent; `low == high` yields exactly the matching keys.
    pub fn open_scan(&self, low: Option<&[u8]>, high: Option<&[u8]>) -> Result<BTreeScan> {
        let start = match low {
            None => self.leftmost_leaf()?,
            Some(low_key) => self.find_leaf(low_key, true)?,
        };
        BTreeScan::new(self.bpm.clone(), start, low, high)
    }

    /// Descends to the leaf for `key`. With `for_scan`, a key equal to a
    /// separator descends left so scans catch duplicates on either side.
    fn find_leaf(&self, key: &[u8], for_scan: bool) -> Result<Option<PageId>> {
        let mut current = self.root_page_id()?;
        if current == INVALID_PAGE_ID {
            return Ok(None);
        }

        loop {
            let next = {
                let guard = self
                    .bpm
                    .checked_read_page(current)?
                    .ok_or(BriarError::PageNotFound(current))?;
                let page = SlottedPageRef::new(guard.data());
                match page.page_type()? {
                    PageType::Leaf => return Ok(Some(current)),
                    PageType::Index => {
                        let node = IndexPageRef::new(guard.data());
                        if for_scan {
                            node.find_page_for_scan(key)?.0
                        } else {
                            node.find_page(key)?.0
                        }
                    }
                }
            };
            current = next;
        }
    }

    /// The leftmost leaf of the tree, or None on an empty tree.
    fn leftmost_leaf(&self) -> Result<Option<PageId>> {
        let mut current = self.root_page_id()?;
        if current == INVALID_PAGE_ID {
            return Ok(None);
        }

        loop {
            let next = {
                let guard = self
                    .bpm
                    .checked_read_page(current)?
                    .ok_or(BriarError::PageNotFound(current))?;
                let page = SlottedPageRef::new(guard.data());
                match page.page_type()? {
                    PageType::Leaf => return Ok(Some(current)),
                    PageType::Index => IndexPageRef::new(guard.data()).leftmost_child()?,
                }
            };
            current = next;
        }
    }

    fn page_type_of(&self, page_id: PageId) -> Result<PageType> {
        let guard = self
            .bpm
            .checked_read_page(page_id)?
            .ok_or(BriarError::PageNotFound(page_id))?;
        SlottedPageRef::new(guard.data()).page_type()
    }

    /// Prints one node, or the whole subtree with `PrintOption::Recursive`.
    pub fn print_tree(&self, page_id: PageId, option: PrintOption) -> Result<()> {
        let children = {
            let guard = self
                .bpm
                .checked_read_page(page_id)?
                .ok_or(BriarError::PageNotFound(page_id))?;
            let page = SlottedPageRef::new(guard.data());
            match page.page_type()? {
                PageType::Leaf => {
                    let leaf = LeafPageRef::new(guard.data());
                    println!("---- leaf node {} ----", page_id.as_u32());
                    let mut cursor = leaf.get_first();
                    while let Some((slot, key, rid)) = cursor {
                        println!("  key: {:?}  rid: {}", String::from_utf8_lossy(key), rid);
                        cursor = leaf.get_next(slot);
                    }
                    println!("  ({} entries)", leaf.num_records());
                    Vec::new()
                }
                PageType::Index => {
                    let node = IndexPageRef::new(guard.data());
                    println!("---- index node {} ----", page_id.as_u32());
                    println!("  leftmost child: {}", node.leftmost_child()?.as_u32());
                    let mut cursor = node.get_first();
                    while let Some((slot, key, child)) = cursor {
                        println!(
                            "  key: {:?}  child: {}",
                            String::from_utf8_lossy(key),
                            child.as_u32()
                        );
                        cursor = node.get_next(slot);
                    }
                    println!("  ({} entries)", node.num_records());
                    index_children(&node)?
                }
            }
        };

        if option == PrintOption::Recursive {
            for child in children {
                self.print_tree(child, PrintOption::Recursive)?;
            }
        }
        Ok(())
    }

    /// Prints every node of the tree, root first.
    pub fn print_whole(&self) -> Result<()> {
        println!("==== B+-tree {} ====", self.name);
        let root = self.root_page_id()?;
        if root == INVALID_PAGE_ID {
            println!("  (empty)");
            return Ok(());
        }
        self.print_tree(root, PrintOption::Recursive)
    }

    /// Walks the tree and gathers page, entry, and fill-factor counts.
    pub fn statistics(&self) -> Result<TreeStatistics> {
        let mut acc = StatsAccumulator::default();
        let root = self.root_page_id()?;
        if root != INVALID_PAGE_ID {
            self.collect_statistics(root, 1, &mut acc)?;
        }
        Ok(acc.finish())
    }

    /// Logs and prints the current statistics.
    pub fn dump_statistics(&self) -> Result<()> {
        let stats = self.statistics()?;
        tracing::info!(
            file = %self.name,
            leaf_pages = stats.leaf_pages,
            index_pages = stats.index_pages,
            data_entries = stats.data_entries,
            index_entries = stats.index_entries,
            height = stats.height,
            "tree statistics"
        );
        println!("{}", stats);
        Ok(())
    }

    fn collect_statistics(
        &self,
        page_id: PageId,
        depth: usize,
        acc: &mut StatsAccumulator,
    ) -> Result<()> {
        let children = {
            let guard = self
                .bpm
                .checked_read_page(page_id)?
                .ok_or(BriarError::PageNotFound(page_id))?;
            let page = SlottedPageRef::new(guard.data());
            let fill = 1.0 - page.available_space() as f64 / PAGE_DATA_SIZE as f64;

            match page.page_type()? {
                PageType::Leaf => {
                    acc.leaf_pages += 1;
                    acc.data_entries += page.num_records() as usize;
                    acc.leaf_fill_total += fill;
                    acc.min_leaf_fill = acc.min_leaf_fill.min(fill);
                    acc.max_leaf_fill = acc.max_leaf_fill.max(fill);
                    acc.height = acc.height.max(depth);
                    Vec::new()
                }
                PageType::Index => {
                    let node = IndexPageRef::new(guard.data());
                    acc.index_pages += 1;
                    acc.index_entries += node.num_records() as usize;
                    acc.index_fill_total += fill;
                    acc.min_index_fill = acc.min_index_fill.min(fill);
                    acc.max_index_fill = acc.max_index_fill.max(fill);
                    index_children(&node)?
                }
            }
        };

        for child in children {
            self.collect_statistics(child, depth + 1, acc)?;
        }
        Ok(())
    }
}

fn index_children(node: &IndexPageRef<'_>) -> Result<Vec<PageId>> {
    let mut children = vec![node.leftmost_child()?];
    let mut cursor = node.get_first();
    while let Some((slot, _, child)) = cursor {
        children.push(child);
        cursor = node.get_next(slot);
    }
    Ok(children)
}

/// Snapshot of tree shape and page occupancy.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeStatistics {
    pub leaf_pages: usize,
    pub index_pages: usize,
    pub data_entries: usize,
    pub index_entries: usize,
    pub height: usize,
    pub min_leaf_fill: f64,
    pub max_leaf_fill: f64,
    pub avg_leaf_fill: f64,
    pub min_index_fill: f64,
    pub max_index_fill: f64,
    pub avg_index_fill: f64,
}

impl fmt::Display for TreeStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "------------ B+-tree statistics ------------")?;
        writeln!(
            f,
            "  total nodes     : {} ({} leaf, {} index)",
            self.leaf_pages + self.index_pages,
            self.leaf_pages,
            self.index_pages
        )?;
        writeln!(f, "  data entries    : {}", self.data_entries)?;
        writeln!(f, "  index entries   : {}", self.index_entries)?;
        writeln!(f, "  height          : {}", self.height)?;
        writeln!(
            f,
            "  leaf fill       : avg {:.3}, min {:.3}, max {:.3}",
            self.avg_leaf_fill, self.min_leaf_fill, self.max_leaf_fill
        )?;
        write!(
            f,
            "  index fill      : avg {:.3}, min {:.3}, max {:.3}",
            self.avg_index_fill, self.min_index_fill, self.max_index_fill
        )
    }
}

struct StatsAccumulator {
    leaf_pages: usize,
    index_pages: usize,
    data_entries: usize,
    index_entries: usize,
    height: usize,
    leaf_fill_total: f64,
    index_fill_total: f64,
    min_leaf_fill: f64,
    max_leaf_fill: f64,
    min_index_fill: f64,
    max_index_fill: f64,
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self {
            leaf_pages: 0,
            index_pages: 0,
            data_entries: 0,
            index_entries: 0,
            height: 0,
            leaf_fill_total: 0.0,
            index_fill_total: 0.0,
            min_leaf_fill: 1.0,
            max_leaf_fill: 0.0,
            min_index_fill: 1.0,
            max_index_fill: 0.0,
        }
    }
}

impl StatsAccumulator {
    fn finish(self) -> TreeStatistics {
        let (min_leaf, max_leaf, avg_leaf) = if self.leaf_pages == 0 {
            (0.0, 0.0, 0.0)
        } else {
            (
                self.min_leaf_fill,
                self.max_leaf_fill,
                self.leaf_fill_total / self.leaf_pages as f64,
            )
        };
        let (min_index, max_index, avg_index) = if self.index_pages == 0 {
            (0.0, 0.0, 0.0)
        } else {
            (
                self.min_index_fill,
                self.max_index_fill,
                self.index_fill_total / self.index_pages as f64,
            )
        };

        TreeStatistics {
            leaf_pages: self.leaf_pages,
            index_pages: self.index_pages,
            data_entries: self.data_entries,
            index_entries: self.index_entries,
            height: self.height,
            min_leaf_fill: min_leaf,
            max_leaf_fill: max_leaf,
            avg_leaf_fill: avg_leaf,
            min_index_fill: min_index,
            max_index_fill: max_index,
            avg_index_fill: avg_index,
        }
    }
}
