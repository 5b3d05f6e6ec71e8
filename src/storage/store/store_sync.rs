pub mod filesystem_store;
pub mod memory_store;

#[cfg(feature = "s3")]
pub mod object_store;

#[cfg(test)]
mod test_util {
    use std::error::Error;

    use crate::storage::{
        ListableStorageTraits, ReadableStorageTraits, ReadableWritableStorageTraits, StorePrefix,
        WritableStorageTraits,
    };

    /// Create a store with the following data
    /// - a/
    ///   - b [0, 1, 2, 3]
    ///   - c [0]
    ///   - d/
    ///     - e
    /// - i/
    ///   - j/
    ///     - k [0, 1]
    pub fn store_write<T: WritableStorageTraits>(store: &T) -> Result<(), Box<dyn Error>> {
        store.erase_prefix(&StorePrefix::root())?;

        store.set(&"a/b".try_into()?, vec![0, 1, 2, 3].into())?;
        store.set(&"a/c".try_into()?, vec![0].into())?;
        store.set(&"a/d/e".try_into()?, vec![].into())?;
        store.set(&"i/j/k".try_into()?, vec![0, 1].into())?;

        store.set(&"erase".try_into()?, vec![].into())?;
        store.erase(&"erase".try_into()?)?;
        store.erase(&"erase".try_into()?)?; // succeeds

        store.set(&"erase_prefix/0".try_into()?, vec![].into())?;
        store.set(&"erase_prefix/1".try_into()?, vec![].into())?;
        store.erase_prefix(&"erase_prefix/".try_into()?)?;

        Ok(())
    }

    pub fn store_read<T: ReadableStorageTraits>(store: &T) -> Result<(), Box<dyn Error>> {
        assert!(store.get(&"notfound".try_into()?)?.is_none());
        assert!(store.size_key(&"notfound".try_into()?)?.is_none());
        assert!(store.last_modified(&"notfound".try_into()?)?.is_none());
        assert!(!store.exists(&"erase".try_into()?)?);
        assert_eq!(
            store.get(&"a/b".try_into()?)?,
            Some(vec![0, 1, 2, 3].into())
        );
        assert_eq!(store.size_key(&"a/b".try_into()?)?, Some(4));
        assert_eq!(store.size_key(&"a/c".try_into()?)?, Some(1));
        assert_eq!(store.size_key(&"i/j/k".try_into()?)?, Some(2));
        assert!(store.last_modified(&"a/b".try_into()?)?.is_some());
        Ok(())
    }

    pub fn store_copy<T: ReadableWritableStorageTraits>(store: &T) -> Result<(), Box<dyn Error>> {
        store.copy(&"a/b".try_into()?, &"copy/b".try_into()?)?;
        assert_eq!(
            store.get(&"copy/b".try_into()?)?,
            Some(vec![0, 1, 2, 3].into())
        );
        assert!(store
            .copy(&"notfound".try_into()?, &"copy/c".try_into()?)
            .is_err());
        store.erase_prefix(&"copy/".try_into()?)?;
        Ok(())
    }

    pub fn store_list<T: ListableStorageTraits>(store: &T) -> Result<(), Box<dyn Error>> {
        assert_eq!(
            store.list()?,
            &[
                "a/b".try_into()?,
                "a/c".try_into()?,
                "a/d/e".try_into()?,
                "i/j/k".try_into()?
            ]
        );
        assert_eq!(
            store.list_prefix(&"a/".try_into()?)?,
            &["a/b".try_into()?, "a/c".try_into()?, "a/d/e".try_into()?]
        );
        assert_eq!(
            store.list_prefix(&"i/".try_into()?)?,
            &["i/j/k".try_into()?]
        );
        assert!(store.list_prefix(&"missing/".try_into()?)?.is_empty());
        Ok(())
    }
}
