pub mod pixelate_compositor;
