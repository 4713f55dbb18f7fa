
mod test_window;
