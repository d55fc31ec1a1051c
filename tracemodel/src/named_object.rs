use std::cmp::Ordering;

/// Processes and threads: things with a display name and an optional
/// explicit sort index from the trace metadata.
pub trait NamedObject {
    fn name(&self) -> &str;
    fn sort_index(&self) -> Option<i64>;
}

/// Explicit sort index first (objects without one go last), then name.
pub fn compare_named<T: NamedObject + ?Sized>(a: &T, b: &T) -> Ordering {
    let by_index = match (a.sort_index(), b.sort_index()) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_index.then_with(|| a.name().cmp(b.name()))
}

pub fn sort_named<T: NamedObject>(objects: &mut [&T]) {
    objects.sort_by(|a, b| compare_named(*a, *b));
}
