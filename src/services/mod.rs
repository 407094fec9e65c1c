pub(crate) mod classification;
