pub mod neighbor_joining;
