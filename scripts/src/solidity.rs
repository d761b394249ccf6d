//! Definitions of Solidity functions called during deployment, linking and diagnosis

use alloy::sol;

sol! {
    #![sol(all_derives)]

    /// The administrative and extension-routing surface of the marketplace
    interface IMarketplace {
        function DEFAULT_ADMIN_ROLE() external view returns (bytes32);
        function EXTENSION_ROLE() external view returns (bytes32);
        function hasRole(bytes32 role, address account) external view returns (bool);
        function grantRole(bytes32 role, address account) external;

        function addExtension(bytes32 extensionId, address extension, string memory name) external;
        function removeExtension(bytes32 extensionId) external;
        function getExtension(bytes32 extensionId) external view returns (address extension, bool enabled, string memory name);
        function getAllExtensionIds() external view returns (bytes32[] memory);

        function platformFee() external view returns (uint16 feeBps, address recipient);
        function nativeTokenWrapper() external view returns (address);
    }

    /// The getters exposed by the offers extension
    interface IOffers {
        function DEFAULT_ADMIN_ROLE() external view returns (bytes32);
        function OFFEROR_ROLE() external view returns (bytes32);
        function MANAGER_ROLE() external view returns (bytes32);
        function hasRole(bytes32 role, address account) external view returns (bool);
        function totalOffers() external view returns (uint256);
    }

    /// The getters exposed by the direct listings extension
    interface IDirectListings {
        function DEFAULT_ADMIN_ROLE() external view returns (bytes32);
        function hasRole(bytes32 role, address account) external view returns (bool);
        function totalListings() external view returns (uint256);
    }
}
