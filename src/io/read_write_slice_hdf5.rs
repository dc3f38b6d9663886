//! `Hdf5` functions to read and write slices of ndarrays
use std::path::Path;

/// Write slice of ndarray dataset to hdf5 file.
/// Supply the full shape of the dataset, and
/// the slice where to put it. Array, and slices
/// shapes must be smaller than the full shape.
///
/// Creates the file and dataset if they do not
/// exist, otherwise overwrites the slice.
///
/// # Errors
/// File can not be created, or file and dataset
/// exist, but a shape mismatch occurs.
pub fn write_slice<A, S, D, T, Sh, P>(
    filename: P,
    varname: &str,
    array: &ndarray::ArrayBase<S, D>,
    slice: ndarray::SliceInfo<T, D, D>,
    full_shape: Sh,
) -> hdf5::Result<()>
where
    A: hdf5::H5Type,
    S: ndarray::Data<Elem = A>,
    D: ndarray::Dimension,
    T: AsRef<[ndarray::SliceInfoElem]>,
    Sh: Into<hdf5::Extents>,
    P: AsRef<Path>,
{
    use std::convert::TryFrom;

    let full_shape = full_shape.into();
    if array.ndim() != full_shape.ndim() {
        return Err(hdf5::Error::from(format!(
            "dimension mismatch of array and full shape, {} vs. {}",
            array.ndim(),
            full_shape.ndim()
        )));
    }

    let filename = filename.as_ref();
    let file = if filename.exists() {
        hdf5::File::append(filename)?
    } else {
        hdf5::File::create(filename)?
    };

    let dset = match file.dataset(varname) {
        Ok(dset) => dset,
        Err(..) => file
            .new_dataset::<A>()
            .no_chunk()
            .shape(full_shape)
            .create(varname)?,
    };
    dset.write_slice(array, hdf5::Hyperslab::try_from(slice)?)?;
    Ok(())
}

/// Read slice of ndarray from hdf5 file.
///
/// # Errors
/// Non-existing file or dataset, or dataset of
/// different dimensionality.
pub fn read_slice<A, D, T, P>(
    filename: P,
    varname: &str,
    slice: ndarray::SliceInfo<T, D, D>,
) -> hdf5::Result<ndarray::Array<A, D>>
where
    A: hdf5::H5Type,
    D: ndarray::Dimension,
    T: AsRef<[ndarray::SliceInfoElem]>,
    P: AsRef<Path>,
{
    let file = hdf5::File::open(filename)?;
    let data = file.dataset(varname)?;
    let y: ndarray::ArrayD<A> = data.read_slice(slice)?;
    y.into_dimensionality::<D>()
        .map_err(|e| hdf5::Error::from(e.to_string()))
}

/// Shape of a dataset
///
/// # Errors
/// Non-existing file or dataset.
pub fn dataset_shape<P: AsRef<Path>>(filename: P, varname: &str) -> hdf5::Result<Vec<usize>> {
    let file = hdf5::File::open(filename)?;
    Ok(file.dataset(varname)?.shape())
}
