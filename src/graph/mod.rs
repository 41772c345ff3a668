pub mod FixedPointGraphTraversal;
