//! Declarative keyword classification.
//!
//! A [`CategoryTable`] maps each category to the keywords that flag it. Free
//! text is lowercased once and every category is tested independently, so a
//! row can carry any subset of flags.

use std::fmt;
use std::marker::PhantomData;

/// A closed set of categories that fits in a [`Flags`] bitset.
pub trait Category: Copy + 'static {
    const ALL: &'static [Self];

    fn index(self) -> usize;

    fn name(self) -> &'static str;
}

/// Independent boolean flags, one per category.
pub struct Flags<C> {
    bits: u32,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Category> Flags<C> {
    pub fn empty() -> Self {
        Self {
            bits: 0,
            _marker: PhantomData,
        }
    }

    pub fn of(categories: &[C]) -> Self {
        let mut flags = Self::empty();
        for c in categories {
            flags.insert(*c);
        }
        flags
    }

    pub fn insert(&mut self, category: C) {
        self.bits |= 1 << category.index();
    }

    pub fn contains(&self, category: C) -> bool {
        self.bits & (1 << category.index()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = C> + '_ {
        C::ALL.iter().copied().filter(|c| self.contains(*c))
    }
}

impl<C: Category> Default for Flags<C> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<C> Clone for Flags<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Flags<C> {}

impl<C> PartialEq for Flags<C> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<C> Eq for Flags<C> {}

impl<C: Category> fmt::Debug for Flags<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|c| c.name())).finish()
    }
}

/// `{category -> keywords}` table. Keywords must be lowercase.
pub struct CategoryTable<C: 'static> {
    entries: &'static [(C, &'static [&'static str])],
}

impl<C: Category> CategoryTable<C> {
    pub const fn new(entries: &'static [(C, &'static [&'static str])]) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &'static [(C, &'static [&'static str])] {
        self.entries
    }

    /// Flags every category with a keyword contained in any of `texts`.
    pub fn classify<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> Flags<C> {
        let haystacks: Vec<String> = texts.into_iter().map(str::to_lowercase).collect();
        let mut flags = Flags::empty();

        for (category, keywords) in self.entries {
            let hit = keywords
                .iter()
                .any(|kw| haystacks.iter().any(|h| h.contains(kw)));
            if hit {
                flags.insert(*category);
            }
        }

        flags
    }
}
