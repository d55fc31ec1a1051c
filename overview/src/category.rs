use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fmt;
use std::hash::Hash;
use tracemodel::Event;

/// The coarse kinds of work the overview strips are painted with.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineCategory {
    Idle,
    Loading,
    Painting,
    Rendering,
    Scripting,
    Other,
}

impl TimelineCategory {
    /// Stacking order of the CPU overview, bottom first.
    pub const OVERVIEW_ORDER: [TimelineCategory; 6] = [
        TimelineCategory::Idle,
        TimelineCategory::Loading,
        TimelineCategory::Painting,
        TimelineCategory::Rendering,
        TimelineCategory::Scripting,
        TimelineCategory::Other,
    ];

    pub fn for_event(event: &Event) -> TimelineCategory {
        TimelineCategory::for_event_name(&event.name)
    }

    pub fn for_event_name(name: &str) -> TimelineCategory {
        use TimelineCategory::*;

        match name {
            "Program" => Other,

            "EventDispatch" | "TimerInstall" | "TimerRemove" | "TimerFire"
            | "XHRReadyStateChange" | "XHRLoad" | "EvaluateScript" | "MarkLoad"
            | "MarkDOMContent" | "TimeStamp" | "ConsoleTime" | "FunctionCall" | "GCEvent"
            | "JSFrame" | "RequestAnimationFrame" | "CancelAnimationFrame"
            | "FireAnimationFrame" | "WebSocketCreate" | "WebSocketSendHandshakeRequest"
            | "WebSocketReceiveHandshakeResponse" | "WebSocketDestroy" | "EmbedderCallback" => {
                Scripting
            }

            "RequestMainThreadFrame" | "BeginFrame" | "BeginMainThreadFrame" | "DrawFrame"
            | "ScheduleStyleRecalculation" | "RecalculateStyles" | "InvalidateLayout"
            | "Layout" | "UpdateLayerTree" | "ScrollLayer" => Rendering,

            "PaintSetup" | "UpdateLayer" | "Paint" | "Rasterize" | "RasterTask"
            | "CompositeLayers" | "MarkFirstPaint" | "Decode Image" | "Resize Image" => Painting,

            "ParseHTML" | "ResourceSendRequest" | "ResourceReceiveResponse" | "ResourceFinish"
            | "ResourceReceivedData" => Loading,

            _ => Other,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TimelineCategory::Idle => "idle",
            TimelineCategory::Loading => "loading",
            TimelineCategory::Painting => "painting",
            TimelineCategory::Rendering => "rendering",
            TimelineCategory::Scripting => "scripting",
            TimelineCategory::Other => "other",
        }
    }
}

impl fmt::Display for TimelineCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Dense indices for a fixed list of categories, built once per rendering
/// pass. The first category is the one idle time is accounted to.
#[derive(Clone, Debug)]
pub struct CategoryIndex<C> {
    categories: Vec<C>,
    indices: FxHashMap<C, usize>,
    fallback: usize,
}

impl<C> CategoryIndex<C>
where
    C: Copy + Eq + Hash,
{
    /// `fallback` is where categories missing from `categories` end up;
    /// it is added at the end if it is not in the list itself.
    pub fn new(categories: &[C], fallback: C) -> CategoryIndex<C> {
        let mut index = CategoryIndex {
            categories: Vec::with_capacity(categories.len() + 1),
            indices: FxHashMap::default(),
            fallback: 0,
        };
        for &category in categories {
            index.insert(category);
        }
        index.fallback = index.insert(fallback);
        index
    }

    fn insert(&mut self, category: C) -> usize {
        if let Some(&index) = self.indices.get(&category) {
            return index;
        }
        let index = self.categories.len();
        self.categories.push(category);
        self.indices.insert(category, index);
        index
    }

    pub fn index_of(&self, category: C) -> usize {
        self.indices.get(&category).copied().unwrap_or(self.fallback)
    }

    pub fn category_at(&self, index: usize) -> Option<C> {
        self.categories.get(index).copied()
    }

    pub fn idle_index(&self) -> usize {
        0
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn categories(&self) -> &[C] {
        &self.categories
    }
}

impl Default for CategoryIndex<TimelineCategory> {
    fn default() -> Self {
        CategoryIndex::new(&TimelineCategory::OVERVIEW_ORDER, TimelineCategory::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_names() {
        assert_eq!(TimelineCategory::for_event_name("FunctionCall"), TimelineCategory::Scripting);
        assert_eq!(TimelineCategory::for_event_name("Layout"), TimelineCategory::Rendering);
        assert_eq!(TimelineCategory::for_event_name("Decode Image"), TimelineCategory::Painting);
        assert_eq!(TimelineCategory::for_event_name("ParseHTML"), TimelineCategory::Loading);
        assert_eq!(TimelineCategory::for_event_name("SomethingNew"), TimelineCategory::Other);
    }

    #[test]
    fn default_index_follows_overview_order() {
        let index = CategoryIndex::default();
        assert_eq!(index.len(), 6);
        assert_eq!(index.idle_index(), index.index_of(TimelineCategory::Idle));
        assert_eq!(index.index_of(TimelineCategory::Scripting), 4);
        assert_eq!(index.category_at(5), Some(TimelineCategory::Other));
        assert_eq!(index.category_at(6), None);
    }

    #[test]
    fn unknown_categories_use_fallback() {
        let index = CategoryIndex::new(&["idle", "js"], "misc");
        assert_eq!(index.len(), 3);
        assert_eq!(index.index_of("js"), 1);
        assert_eq!(index.index_of("css"), 2);
        assert_eq!(index.categories(), &["idle", "js", "misc"]);
    }
}
