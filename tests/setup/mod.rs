pub mod mock_rpc;
