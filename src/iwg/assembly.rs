use crate::dof::DofType;
use crate::field_interpolator::FieldInterpolatorManager;
use crate::iwg::{IntegrationPoint, Iwg};
use eyre::eyre;
use log::trace;
use moris_traits::Real;
use nalgebra::{DMatrix, DVector};
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Side of an interface facet. Bulk integration only uses the leader side.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Leader,
    Follower,
}

/// The contiguous range of element-local equations owned by one dof group on one side.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DofBlock {
    pub side: Side,
    pub dof_type: DofType,
    pub start: usize,
    pub num_fields: usize,
    pub num_bases: usize,
}

impl DofBlock {
    pub fn len(&self) -> usize {
        self.num_fields * self.num_bases
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len()
    }

    /// Range of a single field of the group (e.g. one velocity component).
    ///
    /// # Panics
    ///
    /// Panics if `field` is out of bounds.
    pub fn field_range(&self, field: usize) -> Range<usize> {
        assert!(field < self.num_fields, "Field index {} out of bounds for {}.", field, self.dof_type);
        let start = self.start + field * self.num_bases;
        start..start + self.num_bases
    }
}

/// Partition of the element-local residual into contiguous blocks per (side, dof group).
///
/// Blocks are laid out in the order they are added, without gaps or overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DofAssemblyMap {
    blocks: Vec<DofBlock>,
    size: usize,
}

impl DofAssemblyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block for the given dof group.
    ///
    /// # Errors
    ///
    /// Fails if the group already has a block on the same side.
    pub fn add_block(&mut self, side: Side, dof_type: DofType, num_fields: usize, num_bases: usize) -> eyre::Result<()> {
        if self.block(side, dof_type).is_some() {
            return Err(eyre!("Dof type {} already has an assembly block on the {:?} side.", dof_type, side));
        }
        let block = DofBlock {
            side,
            dof_type,
            start: self.size,
            num_fields,
            num_bases,
        };
        self.size += block.len();
        self.blocks.push(block);
        Ok(())
    }

    /// Builds blocks for the given dof groups from the interpolators of one side.
    pub fn from_interpolators<T: Real>(
        side: Side,
        dof_types: &[DofType],
        fis: &FieldInterpolatorManager<T>,
    ) -> eyre::Result<Self> {
        let mut map = Self::new();
        map.add_side(side, dof_types, fis)?;
        Ok(map)
    }

    pub fn add_side<T: Real>(
        &mut self,
        side: Side,
        dof_types: &[DofType],
        fis: &FieldInterpolatorManager<T>,
    ) -> eyre::Result<()> {
        for &dof_type in dof_types {
            let fi = fis
                .get(dof_type)
                .ok_or_else(|| eyre!("No field interpolator for dof type {} on the {:?} side.", dof_type, side))?;
            self.add_block(
                side,
                dof_type,
                fi.number_of_fields(),
                fi.number_of_space_time_bases(),
            )?;
        }
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn blocks(&self) -> &[DofBlock] {
        &self.blocks
    }

    pub fn block(&self, side: Side, dof_type: DofType) -> Option<&DofBlock> {
        self.blocks
            .iter()
            .find(|block| block.side == side && block.dof_type == dof_type)
    }

    /// # Panics
    ///
    /// Panics if the dof group has no block on the given side.
    pub fn range(&self, side: Side, dof_type: DofType) -> Range<usize> {
        self.expect_block(side, dof_type).range()
    }

    pub fn field_range(&self, side: Side, dof_type: DofType, field: usize) -> Range<usize> {
        self.expect_block(side, dof_type).field_range(field)
    }

    fn expect_block(&self, side: Side, dof_type: DofType) -> &DofBlock {
        self.block(side, dof_type)
            .unwrap_or_else(|| panic!("No assembly block for dof type {} on the {:?} side.", dof_type, side))
    }
}

/// Receives named residual and Jacobian contributions as they are assembled.
pub trait DiagnosticSink<T: Real>: Send + Sync {
    fn residual_block(&self, side: Side, dof_type: DofType, block: &DVector<T>);

    fn jacobian_block(&self, row: (Side, DofType), col: (Side, DofType), block: &DMatrix<T>);
}

/// Sink that writes block norms to the `trace` log level.
#[derive(Debug, Copy, Clone, Default)]
pub struct LogSink;

impl<T: Real> DiagnosticSink<T> for LogSink {
    fn residual_block(&self, side: Side, dof_type: DofType, block: &DVector<T>) {
        trace!("residual {:?}/{}: norm {:?}", side, dof_type, block.norm());
    }

    fn jacobian_block(&self, row: (Side, DofType), col: (Side, DofType), block: &DMatrix<T>) {
        trace!(
            "jacobian {:?}/{} x {:?}/{}: norm {:?}",
            row.0,
            row.1,
            col.0,
            col.1,
            block.norm()
        );
    }
}

/// Element-local residual and Jacobian together with their assembly map.
#[derive(Clone)]
pub struct ElementSet<T: Real> {
    map: DofAssemblyMap,
    residual: DVector<T>,
    jacobian: DMatrix<T>,
    sink: Option<Arc<dyn DiagnosticSink<T>>>,
}

impl<T: Real> fmt::Debug for ElementSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementSet")
            .field("map", &self.map)
            .field("residual", &self.residual)
            .field("jacobian", &self.jacobian)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl<T: Real> ElementSet<T> {
    pub fn new(map: DofAssemblyMap) -> Self {
        let n = map.size();
        Self {
            map,
            residual: DVector::zeros(n),
            jacobian: DMatrix::zeros(n, n),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink<T>>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn map(&self) -> &DofAssemblyMap {
        &self.map
    }

    pub fn residual(&self) -> &DVector<T> {
        &self.residual
    }

    pub fn jacobian(&self) -> &DMatrix<T> {
        &self.jacobian
    }

    pub fn reset(&mut self) {
        self.residual.fill(T::zero());
        self.jacobian.fill(T::zero());
    }

    /// Adds a contribution to the residual block of a dof group.
    ///
    /// # Panics
    ///
    /// Panics if the group has no block or the contribution does not match the block size.
    pub fn add_residual_block(&mut self, side: Side, dof_type: DofType, block: &DVector<T>) {
        let range = self.map.range(side, dof_type);
        assert_eq!(
            block.len(),
            range.len(),
            "Residual block for {:?}/{} has size {}, expected {}.",
            side,
            dof_type,
            block.len(),
            range.len()
        );
        if let Some(sink) = &self.sink {
            sink.residual_block(side, dof_type, block);
        }
        let mut target = self.residual.rows_mut(range.start, range.len());
        target += block;
    }

    /// Adds a contribution to the Jacobian block coupling two dof groups.
    ///
    /// # Panics
    ///
    /// Panics if either group has no block or the contribution has the wrong shape.
    pub fn add_jacobian_block(&mut self, row: (Side, DofType), col: (Side, DofType), block: &DMatrix<T>) {
        let rows = self.map.range(row.0, row.1);
        let cols = self.map.range(col.0, col.1);
        assert_eq!(
            block.shape(),
            (rows.len(), cols.len()),
            "Jacobian block for {:?}/{} x {:?}/{} has shape {:?}, expected {:?}.",
            row.0,
            row.1,
            col.0,
            col.1,
            block.shape(),
            (rows.len(), cols.len())
        );
        if let Some(sink) = &self.sink {
            sink.jacobian_block(row, col, block);
        }
        let mut target = self
            .jacobian
            .view_mut((rows.start, cols.start), (rows.len(), cols.len()));
        target += block;
    }
}

/// Source of elements and their integration points for [`assemble_elements_par`].
pub trait ElementQuadrature<T: Real>: Sync {
    fn num_elements(&self) -> usize;

    fn assembly_map(&self, element_index: usize) -> DofAssemblyMap;

    /// Calls `f` once per integration point of the element.
    fn for_each_point(&self, element_index: usize, f: &mut dyn FnMut(&IntegrationPoint<T>));
}

/// Integrates a single element with the given IWG.
pub fn assemble_element<T, Q>(iwg: &mut dyn Iwg<T>, quadrature: &Q, element_index: usize, compute_jacobian: bool) -> ElementSet<T>
where
    T: Real,
    Q: ElementQuadrature<T> + ?Sized,
{
    let mut set = ElementSet::new(quadrature.assembly_map(element_index));
    quadrature.for_each_point(element_index, &mut |point| {
        iwg.reset_eval_flags();
        iwg.compute_residual(point, &mut set);
        if compute_jacobian {
            iwg.compute_jacobian(point, &mut set);
        }
    });
    trace!(
        "{}: assembled element {} (residual norm {:?})",
        iwg.name(),
        element_index,
        set.residual().norm()
    );
    set
}

/// Integrates all elements in parallel.
///
/// IWGs and their constitutive models cache per-point state and must not be shared between
/// threads, so every rayon worker operates on its own clone of `iwg`.
pub fn assemble_elements_par<T, Q>(iwg: &dyn Iwg<T>, quadrature: &Q, compute_jacobian: bool) -> Vec<ElementSet<T>>
where
    T: Real,
    Q: ElementQuadrature<T> + ?Sized,
{
    (0..quadrature.num_elements())
        .into_par_iter()
        .with_min_len(16)
        .map_init(
            || iwg.clone_box(),
            |worker_iwg, element_index| assemble_element(worker_iwg.as_mut(), quadrature, element_index, compute_jacobian),
        )
        .collect()
}
