use crate::dof::DofType;
use crate::field_interpolator::num_derivative_components;
use crate::iwg::{ElementSet, IntegrationPoint, Iwg, Side};
use eyre::eyre;
use log::debug;
use moris_traits::Real;
use nalgebra::{DMatrix, DVector};

const NAME: &str = "GhostStabilization";

/// Projects a Voigt-flattened gradient of the given order onto the facet normal.
///
/// The result has one row per component of the contracted gradient (Voigt order of order - 1)
/// and one column per derivative component of the given order.
///
/// # Panics
///
/// Panics if the order is not 1, 2 or 3, or the normal is not 2- or 3-dimensional.
pub fn ghost_normal_matrix<T: Real>(order: usize, normal: &DVector<T>) -> DMatrix<T> {
    let space_dim = normal.len();
    let z = T::zero();
    match (space_dim, order) {
        (2..=3, 1) => DMatrix::from_row_slice(1, space_dim, normal.as_slice()),
        (2, 2) => {
            let (n1, n2) = (normal[0], normal[1]);
            DMatrix::from_row_slice(2, 3, &[n1, z, n2, z, n2, n1])
        }
        (3, 2) => {
            let (n1, n2, n3) = (normal[0], normal[1], normal[2]);
            #[rustfmt::skip]
            let m = DMatrix::from_row_slice(3, 6, &[
                n1, z, z, z, n3, n2,
                z, n2, z, n3, z, n1,
                z, z, n3, n2, n1, z,
            ]);
            m
        }
        (2, 3) => {
            let (n1, n2) = (normal[0], normal[1]);
            #[rustfmt::skip]
            let m = DMatrix::from_row_slice(3, 4, &[
                n1, z, n2, z,
                z, n2, z, n1,
                z, z, n1, n2,
            ]);
            m
        }
        (3, 3) => {
            let (n1, n2, n3) = (normal[0], normal[1], normal[2]);
            // Columns: xxx, yyy, zzz, xxy, xxz, xyy, yyz, xzz, yzz, xyz
            let entries: [[(usize, T); 3]; 6] = [
                [(0, n1), (3, n2), (4, n3)],
                [(5, n1), (1, n2), (6, n3)],
                [(7, n1), (8, n2), (2, n3)],
                [(9, n1), (6, n2), (8, n3)],
                [(4, n1), (9, n2), (7, n3)],
                [(3, n1), (5, n2), (9, n3)],
            ];
            let mut m = DMatrix::zeros(6, 10);
            for (row, row_entries) in entries.iter().enumerate() {
                for &(col, value) in row_entries {
                    m[(row, col)] = value;
                }
            }
            m
        }
        _ => panic!(
            "Ghost normal matrix of order {} in {} dimensions is not supported.",
            order, space_dim
        ),
    }
}

/// Face-oriented ghost penalty for one dof group.
///
/// For each order `p` up to the interpolation order, adds
/// `γ h^(2p-1) [[∇ᵖv]]ᵀ Nᵀ N [[∇ᵖu]]` where `[[·]]` is the jump from follower to leader and `N` the
/// normal matrix of order `p`. Vector fields are penalized component by component.
#[derive(Debug, Clone, PartialEq)]
pub struct GhostIwg<T: Real> {
    dof_type: DofType,
    order: usize,
    penalty: T,
    mesh_size: T,
}

impl<T: Real> GhostIwg<T> {
    /// # Errors
    ///
    /// Fails if the interpolation order is not 1, 2 or 3.
    pub fn new(dof_type: DofType, order: usize, penalty: T, mesh_size: T) -> eyre::Result<Self> {
        if !(1..=3).contains(&order) {
            return Err(eyre!(
                "{}: interpolation order {} is not supported (supported orders are 1 to 3).",
                NAME,
                order
            ));
        }
        debug!("{}: {} of order {}", NAME, dof_type, order);
        Ok(Self {
            dof_type,
            order,
            penalty,
            mesh_size,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    fn scaling(&self, order: usize) -> T {
        self.penalty * self.mesh_size.powi(2 * order as i32 - 1)
    }

    /// Projected basis operators `N_p dⁿN/dxⁿ` of both sides for one order.
    fn projected_operators(&self, order: usize, point: &IntegrationPoint<T>) -> (DMatrix<T>, DMatrix<T>) {
        let normal = point.normal();
        let leader = point.side(Side::Leader).field_interpolator(self.dof_type);
        let follower = point.side(Side::Follower).field_interpolator(self.dof_type);
        let expected = num_derivative_components(normal.len(), order);
        let normal_matrix = ghost_normal_matrix(order, normal);

        let leader_derivatives = leader.dnndxn(order);
        let follower_derivatives = follower.dnndxn(order);
        assert_eq!(leader_derivatives.nrows(), expected);
        assert_eq!(follower_derivatives.nrows(), expected);
        (&normal_matrix * leader_derivatives, &normal_matrix * follower_derivatives)
    }

    /// Projected jump of the order-`order` gradient, one column per field.
    fn projected_jump(&self, order: usize, point: &IntegrationPoint<T>) -> DMatrix<T> {
        let normal_matrix = ghost_normal_matrix(order, point.normal());
        let leader = point.side(Side::Leader).field_interpolator(self.dof_type);
        let follower = point.side(Side::Follower).field_interpolator(self.dof_type);
        normal_matrix * (leader.gradx(order) - follower.gradx(order))
    }
}

impl<T: Real> Iwg<T> for GhostIwg<T> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn residual_dof_types(&self) -> Vec<DofType> {
        vec![self.dof_type]
    }

    fn requested_dof_types(&self) -> Vec<DofType> {
        vec![self.dof_type]
    }

    fn reset_eval_flags(&mut self) {}

    fn compute_residual(&mut self, point: &IntegrationPoint<T>, set: &mut ElementSet<T>) {
        let leader = point.side(Side::Leader).field_interpolator(self.dof_type);
        let follower = point.side(Side::Follower).field_interpolator(self.dof_type);
        let num_fields = leader.number_of_fields();
        let (nb_leader, nb_follower) = (
            leader.number_of_space_time_bases(),
            follower.number_of_space_time_bases(),
        );

        let mut r_leader = DVector::zeros(num_fields * nb_leader);
        let mut r_follower = DVector::zeros(num_fields * nb_follower);
        for order in 1..=self.order {
            let scale = self.scaling(order) * point.weight;
            let (p_leader, p_follower) = self.projected_operators(order, point);
            let jump = self.projected_jump(order, point);
            for field in 0..num_fields {
                let jump_f = jump.column(field);
                let mut leader_rows = r_leader.rows_mut(field * nb_leader, nb_leader);
                leader_rows += p_leader.tr_mul(&jump_f) * scale;
                let mut follower_rows = r_follower.rows_mut(field * nb_follower, nb_follower);
                follower_rows -= p_follower.tr_mul(&jump_f) * scale;
            }
        }
        set.add_residual_block(Side::Leader, self.dof_type, &r_leader);
        set.add_residual_block(Side::Follower, self.dof_type, &r_follower);
    }

    fn compute_jacobian(&mut self, point: &IntegrationPoint<T>, set: &mut ElementSet<T>) {
        let leader = point.side(Side::Leader).field_interpolator(self.dof_type);
        let follower = point.side(Side::Follower).field_interpolator(self.dof_type);
        let num_fields = leader.number_of_fields();
        let nb = [
            leader.number_of_space_time_bases(),
            follower.number_of_space_time_bases(),
        ];
        let sides = [Side::Leader, Side::Follower];

        let mut blocks: Vec<DMatrix<T>> = (0..4)
            .map(|k| DMatrix::zeros(num_fields * nb[k / 2], num_fields * nb[k % 2]))
            .collect();
        for order in 1..=self.order {
            let scale = self.scaling(order) * point.weight;
            let (p_leader, p_follower) = self.projected_operators(order, point);
            let operators = [&p_leader, &p_follower];
            let signs = [T::one(), -T::one()];
            for (k, block) in blocks.iter_mut().enumerate() {
                let (row_side, col_side) = (k / 2, k % 2);
                let contribution =
                    operators[row_side].tr_mul(operators[col_side]) * (scale * signs[row_side] * signs[col_side]);
                for field in 0..num_fields {
                    let mut target = block.view_mut(
                        (field * nb[row_side], field * nb[col_side]),
                        (nb[row_side], nb[col_side]),
                    );
                    target += &contribution;
                }
            }
        }
        for (k, block) in blocks.iter().enumerate() {
            set.add_jacobian_block(
                (sides[k / 2], self.dof_type),
                (sides[k % 2], self.dof_type),
                block,
            );
        }
    }

    fn clone_box(&self) -> Box<dyn Iwg<T>> {
        Box::new(self.clone())
    }
}
