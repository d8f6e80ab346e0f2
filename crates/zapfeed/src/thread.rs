use std::collections::HashMap;

use enrelay::{Note, NoteId};

#[derive(Debug, Clone)]
pub struct ThreadedReply {
    pub note: Note,
    pub level: u32,
}

/// Assign parent-relative nesting levels to a flat reply set.
///
/// Replies are sorted oldest-first before the pass, so any parent that
/// was created before its children is leveled first regardless of
/// network arrival order. A reply whose parent is not in the set
/// flattens to level 0.
pub fn assign_reply_levels(mut replies: Vec<Note>) -> Vec<ThreadedReply> {
    replies.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut levels: HashMap<NoteId, u32> = HashMap::with_capacity(replies.len());
    let mut out = Vec::with_capacity(replies.len());

    for note in replies {
        let level = note
            .referenced_event()
            .and_then(|parent| levels.get(&parent).copied())
            .map_or(0, |parent_level| parent_level + 1);

        levels.insert(note.id, level);
        out.push(ThreadedReply { note, level });
    }

    out
}
