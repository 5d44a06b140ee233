pub(crate) const RELEASE: i32 = 0;
pub(crate) const PRESS: i32 = 1;
pub(crate) const EV_KEY: i32 = 1;
