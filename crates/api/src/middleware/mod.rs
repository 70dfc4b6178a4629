pub mod feature_gate;
