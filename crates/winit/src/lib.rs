pub mod window_swap_chain;
