pub(crate) trait Parity {
    fn is_even(self) -> bool;
}

impl Parity for usize {
    #[inline]
    fn is_even(self) -> bool {
        self % 2 == 0
    }
}
