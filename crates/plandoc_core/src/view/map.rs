use std::collections::HashSet;

use plandoc_error::{PlanError, Result};

use super::{TableView, VectorView};
use crate::schema::{VT_MAP_KEYS, VT_MAP_VALUES};

/// Lazy view of a `PlanMap` table.
#[derive(Debug, Clone, Copy)]
pub struct PlanMapView<'a> {
    table: TableView<'a>,
}

impl<'a> PlanMapView<'a> {
    pub fn new(table: TableView<'a>) -> Self {
        PlanMapView { table }
    }

    pub fn table(&self) -> TableView<'a> {
        self.table
    }

    /// Resolve the key and value vectors, checking that keys are unique.
    ///
    /// Every accessor goes through here so a map with duplicate keys is
    /// reported as corrupt instead of resolving to whichever entry comes
    /// first.
    fn vectors(&self) -> Result<Option<(VectorView<'a>, VectorView<'a>)>> {
        let vectors = self.unchecked_vectors()?;
        if let Some((keys, _)) = &vectors {
            let mut seen = HashSet::with_capacity(keys.len());
            for idx in 0..keys.len() {
                let key = keys.get_str(idx)?;
                if !seen.insert(key) {
                    return Err(PlanError::corrupt("Duplicate key in plan map")
                        .with_field("key", key)
                        .with_field("index", idx));
                }
            }
        }
        Ok(vectors)
    }

    /// Resolve the key and value vectors. Both absent is an empty map.
    fn unchecked_vectors(&self) -> Result<Option<(VectorView<'a>, VectorView<'a>)>> {
        let keys = self.table.get_vector(VT_MAP_KEYS)?;
        let values = self.table.get_vector(VT_MAP_VALUES)?;

        match (keys, values) {
            (Some(keys), Some(values)) if keys.len() == values.len() => Ok(Some((keys, values))),
            (None, None) => Ok(None),
            (Some(v), None) | (None, Some(v)) if v.is_empty() => Ok(None),
            (keys, values) => Err(PlanError::corrupt("Plan map keys and values differ in length")
                .with_field("keys", keys.map(|v| v.len()).unwrap_or(0))
                .with_field("values", values.map(|v| v.len()).unwrap_or(0))),
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.vectors()?.map(|(keys, _)| keys.len()).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Get the entry at `idx` in encoded order.
    pub fn entry(&self, idx: usize) -> Result<(&'a str, &'a str)> {
        match self.vectors()? {
            Some((keys, values)) => Ok((keys.get_str(idx)?, values.get_str(idx)?)),
            None => Err(PlanError::invalid_argument("Map index out of range")
                .with_field("index", idx)
                .with_field("len", 0)),
        }
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Result<Option<&'a str>> {
        let (keys, values) = match self.vectors()? {
            Some(vectors) => vectors,
            None => return Ok(None),
        };
        for idx in 0..keys.len() {
            if keys.get_str(idx)? == key {
                return Ok(Some(values.get_str(idx)?));
            }
        }
        Ok(None)
    }

    pub fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Iterate entries in encoded order.
    pub fn iter(&self) -> Result<PlanMapIter<'a>> {
        Ok(PlanMapIter {
            vectors: self.vectors()?,
            idx: 0,
        })
    }

    /// Check every entry is readable and that keys are unique.
    pub fn validate(&self) -> Result<()> {
        for entry in self.iter()? {
            entry?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct PlanMapIter<'a> {
    vectors: Option<(VectorView<'a>, VectorView<'a>)>,
    idx: usize,
}

impl<'a> Iterator for PlanMapIter<'a> {
    type Item = Result<(&'a str, &'a str)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (keys, values) = self.vectors.as_ref()?;
        if self.idx >= keys.len() {
            return None;
        }
        let idx = self.idx;
        self.idx += 1;

        let entry = keys
            .get_str(idx)
            .and_then(|key| Ok((key, values.get_str(idx)?)));
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .vectors
            .as_ref()
            .map(|(keys, _)| keys.len() - self.idx)
            .unwrap_or(0);
        (remaining, Some(remaining))
    }
}
