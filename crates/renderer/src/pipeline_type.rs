//! Pipeline types and per-type storage.

use std::ops::{Index, IndexMut};

/// The graphics pipelines the renderer draws with, in recording order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineType {
    /// Full-screen cube-map background. No depth attachment.
    Sky,
    /// Depth-tested instanced meshes.
    Standard,
}

impl PipelineType {
    /// Every pipeline type, in the order passes are recorded.
    pub const ALL: [PipelineType; 2] = [PipelineType::Sky, PipelineType::Standard];

    /// Number of pipeline types.
    pub const COUNT: usize = Self::ALL.len();

    /// Position in [`PipelineType::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            PipelineType::Sky => 0,
            PipelineType::Standard => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            PipelineType::Sky => "sky",
            PipelineType::Standard => "standard",
        }
    }
}

/// One value per [`PipelineType`], stored inline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PerPipeline<T>([T; PipelineType::COUNT]);

impl<T> PerPipeline<T> {
    /// Builds the array by calling `make` for each type in [`PipelineType::ALL`] order.
    pub fn from_fn(mut make: impl FnMut(PipelineType) -> T) -> Self {
        Self(PipelineType::ALL.map(&mut make))
    }

    /// Like [`PerPipeline::from_fn`], stopping at the first error.
    pub fn try_from_fn<E>(mut make: impl FnMut(PipelineType) -> Result<T, E>) -> Result<Self, E> {
        let sky = make(PipelineType::Sky)?;
        let standard = make(PipelineType::Standard)?;
        Ok(Self([sky, standard]))
    }

    /// Iterates `(type, value)` pairs in [`PipelineType::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (PipelineType, &T)> {
        PipelineType::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T> Index<PipelineType> for PerPipeline<T> {
    type Output = T;

    fn index(&self, pipeline: PipelineType) -> &T {
        &self.0[pipeline.index()]
    }
}

impl<T> IndexMut<PipelineType> for PerPipeline<T> {
    fn index_mut(&mut self, pipeline: PipelineType) -> &mut T {
        &mut self.0[pipeline.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_all_order() {
        for (i, pipeline) in PipelineType::ALL.iter().enumerate() {
            assert_eq!(pipeline.index(), i);
        }
    }

    #[test]
    fn test_sky_recorded_first() {
        assert_eq!(PipelineType::ALL[0], PipelineType::Sky);
    }

    #[test]
    fn test_per_pipeline_indexing() {
        let mut values = PerPipeline::from_fn(|p| p.name().len());
        assert_eq!(values[PipelineType::Sky], 3);
        assert_eq!(values[PipelineType::Standard], 8);

        values[PipelineType::Sky] = 0;
        let collected: Vec<_> = values.iter().map(|(p, v)| (p, *v)).collect();
        assert_eq!(
            collected,
            vec![(PipelineType::Sky, 0), (PipelineType::Standard, 8)]
        );
    }

    #[test]
    fn test_try_from_fn_stops_at_error() {
        let mut calls = Vec::new();
        let result: Result<PerPipeline<u32>, &str> = PerPipeline::try_from_fn(|p| {
            calls.push(p);
            match p {
                PipelineType::Sky => Err("no shader"),
                PipelineType::Standard => Ok(1),
            }
        });
        assert_eq!(result, Err("no shader"));
        assert_eq!(calls, vec![PipelineType::Sky]);
    }
}
