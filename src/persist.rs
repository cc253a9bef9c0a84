use crate::error::Result;
use crate::network::Network;
use log::debug;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

impl Network {
    /// Writes a bincode snapshot of every layer and connection to `writer`.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    /// Reads a snapshot written by [`Network::write_to`], rejecting any that does not describe a
    /// structurally valid network.
    pub fn read_from<R: Read>(reader: R) -> Result<Network> {
        let network: Network = bincode::deserialize_from(reader)?;
        network.validate()?;
        Ok(network)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        debug!("Saved {self} to {}", path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Network> {
        let path = path.as_ref();
        let network = Network::read_from(BufReader::new(File::open(path)?))?;
        debug!("Loaded {network} from {}", path.display());
        Ok(network)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::NetworkError;
    use crate::network::{INPUT_SIZE, Network};
    use ndarray::Array2;
    use ndarray_rand::rand::{SeedableRng, rngs::StdRng};

    fn image() -> Vec<u8> {
        (0..INPUT_SIZE).map(|i| (i * 7 % 256) as u8).collect()
    }

    #[test]
    fn snapshot_round_trip_preserves_inference() {
        let mut network = Network::new(24, 2, &mut StdRng::seed_from_u64(21)).unwrap();
        network.forward(&image()).unwrap();

        let mut bytes = Vec::new();
        network.write_to(&mut bytes).unwrap();
        let mut restored = Network::read_from(bytes.as_slice()).unwrap();
        assert_eq!(restored, network);

        restored.forward(&image()).unwrap();
        assert_eq!(restored.output_vector(), network.output_vector());
    }

    #[test]
    fn save_and_load_through_a_file() {
        let mut network = Network::new(16, 1, &mut StdRng::seed_from_u64(22)).unwrap();
        let path = std::env::temp_dir().join(format!("digit-network-{}.bin", std::process::id()));
        network.save(&path).unwrap();
        let mut loaded = Network::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        network.forward(&image()).unwrap();
        loaded.forward(&image()).unwrap();
        assert_eq!(loaded.output_vector(), network.output_vector());
    }

    #[test]
    fn rejects_truncated_snapshot() {
        let network = Network::new(16, 1, &mut StdRng::seed_from_u64(23)).unwrap();
        let mut bytes = Vec::new();
        network.write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() / 2);
        assert!(matches!(
            Network::read_from(bytes.as_slice()),
            Err(NetworkError::Serialization(_))
        ));
    }

    #[test]
    fn rejects_structurally_invalid_snapshot() {
        // A 784 -> 10 network whose output connection is encoded with the wrong input width.
        let network = Network::new(0, 0, &mut StdRng::seed_from_u64(24)).unwrap();
        let mut bytes = Vec::new();
        network.write_to(&mut bytes).unwrap();

        let weights = Array2::<f64>::zeros((10, 5));
        let mut wrong = Vec::new();
        bincode::serialize_into(&mut wrong, &weights).unwrap();
        let mut right = Vec::new();
        bincode::serialize_into(&mut right, network.connections()[0].weights()).unwrap();
        let start = bytes
            .windows(right.len())
            .position(|window| window == right.as_slice())
            .unwrap();
        bytes.splice(start..start + right.len(), wrong);

        assert!(matches!(
            Network::read_from(bytes.as_slice()),
            Err(NetworkError::ShapeMismatch { .. })
        ));
    }
}
